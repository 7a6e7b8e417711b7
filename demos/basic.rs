//! Minimal switchyard example: typed, plain and native handlers side by side,
//! plus a route added while the server is running.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/users/new
//!   curl http://localhost:3000/users/abc          # 400, not a u64
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X PUT http://localhost:3000/users/42    # 405, Allow: GET, DELETE
//!   curl -i http://localhost:3000/assets          # 301 to /assets/
//!   curl http://localhost:3000/assets/css/site.css
//!   curl http://localhost:3000/version            # registered after start

use std::convert::Infallible;
use std::future::{Ready, ready};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::Deserialize;
use switchyard::{Context, Ctx, Json, Method, Native, Params, Request, Response, Router, Server, SharedRouter};

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = SharedRouter::new(
        Router::new()
            .get("/users/:id",    get_user)
            .get("/users/new",    new_user_form)
            .post("/users",       create_user)
            .delete("/users/:id", delete_user)
            .get("/assets/*path", Native(Assets)),
    );

    // Routes may still be added once serving has started.
    let late = app.clone();
    tokio::spawn(async move {
        if let Err(e) = late.register(Method::Get, "/version", version) {
            tracing::error!("failed to add /version: {e}");
        }
    });

    if let Err(e) = Server::bind(([0, 0, 0, 0], 3000)).serve(app).await {
        tracing::error!("server error: {e}");
    }
}

// GET /users/:id, id converted before the handler runs
async fn get_user(ctx: Ctx, id: u64) -> Response {
    ctx.json(&serde_json::json!({ "id": id, "name": "alice" }))
}

// GET /users/new, static segment beats :id
async fn new_user_form(_req: Request) -> &'static str {
    "<form>…</form>"
}

// POST /users, body decoded by the Json context
async fn create_user(ctx: Json<NewUser>) -> Response {
    let Some(user) = ctx.body() else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    ctx.response()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(&serde_json::json!({ "id": 99, "name": user.name }))
}

// DELETE /users/:id → 204 No Content
async fn delete_user(_ctx: Ctx, _id: u64) {}

async fn version(_req: Request) -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}

/// A hand-written hyper service mounted under a catch-all.
struct Assets;

impl hyper::service::Service<http::Request<Full<Bytes>>> for Assets {
    type Response = http::Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Infallible>>;

    fn call(&self, req: http::Request<Full<Bytes>>) -> Self::Future {
        let path = Params::of(&req).and_then(|p| p.get("path")).unwrap_or_default();
        let body = format!("asset {path}");
        ready(Ok(http::Response::new(Full::new(Bytes::from(body)))))
    }
}
