// Round trips over a real TCP socket.

use std::net::SocketAddr;

use switchyard::{Ctx, Method, Request, Router, Server, SharedRouter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

async fn greet(_: Ctx, name: String) -> String {
    format!("hello {name}")
}

async fn pong(_: Request) -> &'static str {
    "pong"
}

async fn start(router: impl Into<SharedRouter>) -> (SocketAddr, oneshot::Sender<()>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let router: SharedRouter = router.into();
    let handle = tokio::spawn(async move {
        Server::from_listener(listener)
            .serve_with_shutdown(router, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (addr, tx, handle)
}

async fn send(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn serves_routes_over_tcp() {
    let router = Router::new().get("/greet/:name", greet).post("/ping", pong);
    let (addr, shutdown, server) = start(router).await;

    let res = send(addr, "GET", "/greet/ada").await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.ends_with("hello ada"), "{res}");

    let res = send(addr, "GET", "/ping").await;
    assert!(res.starts_with("HTTP/1.1 405"), "{res}");
    assert!(res.to_ascii_lowercase().contains("allow: post"), "{res}");

    let res = send(addr, "GET", "/missing").await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");

    shutdown.send(()).unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn routes_added_while_serving_are_reachable() {
    let shared = SharedRouter::new(Router::new().get("/greet/:name", greet));
    let (addr, shutdown, server) = start(shared.clone()).await;

    let res = send(addr, "GET", "/late").await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");

    shared.register(Method::Get, "/late", pong).unwrap();

    let res = send(addr, "GET", "/late").await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.ends_with("pong"), "{res}");

    shutdown.send(()).unwrap();
    server.await.unwrap();
}
