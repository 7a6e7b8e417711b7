//! Per-request pipeline.
//!
//! ```text
//! resolve(method, path)
//!   ├─ not found      → 404 (or the fallback handler)
//!   ├─ trailing slash → 301 with Location
//!   ├─ wrong method   → 405 with Allow (204 for OPTIONS)
//!   └─ matched        → attach params → endpoint
//!                          typed: create ctx → decode → bind params → handler
//!                          plain / native: handler
//! ```
//!
//! A panic anywhere inside the endpoint is caught and answered with `500`.
//! The router itself is only ever read here, so any number of requests can
//! run through it at once.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use futures_util::FutureExt;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::{BoxError, Rejection};
use crate::handler::{Endpoint, Shape};
use crate::method::Method;
use crate::params::{FromParam, ParamError, Params};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::{Resolution, Router};

impl Router {
    /// Routes one buffered request and produces its response.
    ///
    /// Every outcome is a response: routing misses, decode failures,
    /// conversion failures and handler panics all map to a status code.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let endpoint = match self.resolve(req.method(), req.path()) {
            Resolution::Matched { endpoint, params } => {
                req.set_params(params);
                endpoint
            }
            Resolution::Redirect { location } => return redirect(&req, location),
            Resolution::MethodNotAllowed { allowed } => {
                return self.method_not_allowed(&req, &allowed);
            }
            Resolution::NotFound => match self.fallback() {
                Some(endpoint) => endpoint,
                None => {
                    debug!(method = %req.method(), path = req.path(), "no route");
                    return Response::status(StatusCode::NOT_FOUND);
                }
            },
        };
        invoke(endpoint, req).await
    }

    /// Host entry point: buffers `req`'s body, dispatches, and returns the
    /// response in the form hyper writes to the wire.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        match buffer(req).await {
            Ok(req) => self.dispatch(req).await.into_inner(),
            Err(res) => res.into_inner(),
        }
    }

    fn method_not_allowed(&self, req: &Request, allowed: &[Method]) -> Response {
        let mut allow = allowed.iter().copied().map(Method::as_str).collect::<Vec<_>>().join(", ");

        if self.handles_options() && req.method() == http::Method::OPTIONS {
            allow.push_str(", OPTIONS");
            return Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header("allow", &allow)
                .no_body();
        }

        debug!(method = %req.method(), path = req.path(), allow = %allow, "method not allowed");
        Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header("allow", &allow)
            .no_body()
    }
}

/// Collects the body of a raw request. A body that fails mid-stream answers
/// `400`.
pub(crate) async fn buffer<B>(req: http::Request<B>) -> Result<Request, Response>
where
    B: hyper::body::Body<Data = Bytes> + Send,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    match body.collect().await {
        Ok(collected) => Ok(Request::new(parts, collected.to_bytes())),
        Err(e) => {
            let e: BoxError = e.into();
            warn!(error = %e, "failed to read request body");
            Err(Response::status(StatusCode::BAD_REQUEST))
        }
    }
}

fn redirect(req: &Request, mut location: String) -> Response {
    if let Some(query) = req.query() {
        location.push('?');
        location.push_str(query);
    }
    debug!(from = req.path(), to = %location, "trailing slash redirect");
    Response::redirect(StatusCode::MOVED_PERMANENTLY, &location)
}

async fn invoke(endpoint: &Endpoint, req: Request) -> Response {
    // Typed endpoints check again after decoding.
    if req.is_cancelled() {
        debug!(path = req.path(), "request cancelled before dispatch");
        return Rejection::Cancelled.into_response();
    }

    let shape = endpoint.shape();
    let path = req.path().to_owned();

    let fut = match panic::catch_unwind(AssertUnwindSafe(|| endpoint.call(req))) {
        Ok(fut) => fut,
        Err(payload) => return panicked(shape, &path, payload),
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => panicked(shape, &path, payload),
    }
}

fn panicked(shape: Shape, path: &str, payload: Box<dyn Any + Send>) -> Response {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>");
    error!(?shape, path, panic = message, "handler panicked");
    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
}

// ── Typed-handler steps ───────────────────────────────────────────────────────

/// Builds a fresh context for `req` and runs its decode hook.
///
/// The params stay on the context's request; the binder reads them from
/// there. Cancellation while decoding wins over the decode result.
pub(crate) async fn instantiate<C: Context>(req: Request) -> Result<C, Rejection> {
    let cancel = req.cancellation().clone();
    let mut ctx = C::create(req);

    tokio::select! {
        biased;

        () = cancel.cancelled() => {
            debug!("request cancelled while decoding");
            Err(Rejection::Cancelled)
        }

        decoded = ctx.decode() => match decoded {
            Ok(()) => Ok(ctx),
            Err(rejection) => {
                warn!(error = %rejection, "request body rejected");
                Err(rejection)
            }
        },
    }
}

/// Converts the captured value at `position` into the handler's declared type.
pub(crate) fn bind<T: FromParam>(params: &Params, position: usize) -> Result<T, Rejection> {
    let Some(param) = params.iter().nth(position) else {
        return Err(Rejection::Param {
            position,
            name: String::new(),
            source: ParamError::new("", std::any::type_name::<T>(), "no value captured"),
        });
    };

    T::from_param(param.value()).map_err(|source| {
        debug!(position, name = param.name(), value = param.value(), expected = source.expected(), "parameter rejected");
        Rejection::Param { position, name: param.name().to_owned(), source }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::context::Ctx;

    fn request(method: http::Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    async fn ok(_: Request) -> &'static str {
        "ok"
    }

    async fn user(ctx: Ctx, id: u64) -> Response {
        ctx.text(format!("user {id}"))
    }

    #[test]
    fn bind_converts_by_position() {
        let mut params = Params::new();
        params.push(Arc::from("org"), "acme");
        params.push(Arc::from("id"), "12");

        assert_eq!(bind::<String>(&params, 0).unwrap(), "acme");
        assert_eq!(bind::<u16>(&params, 1).unwrap(), 12);

        match bind::<u16>(&params, 0) {
            Err(Rejection::Param { position, name, .. }) => {
                assert_eq!(position, 0);
                assert_eq!(name, "org");
            }
            other => panic!("expected param rejection, got {other:?}"),
        }
        assert!(matches!(bind::<u16>(&params, 2), Err(Rejection::Param { position: 2, .. })));
    }

    #[tokio::test]
    async fn matched_typed_route_runs_handler() {
        let router = Router::new().get("/users/:id", user);
        let res = router.dispatch(request(http::Method::GET, "/users/42")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"user 42");
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        let router = Router::new().get("/users/:id", user);
        let res = router.dispatch(request(http::Method::GET, "/nope")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fallback_handler_serves_misses() {
        let router = Router::new()
            .get("/", ok)
            .not_found(|req: Request| async move { (StatusCode::NOT_FOUND, format!("no {}", req.path())) });
        let res = router.dispatch(request(http::Method::GET, "/missing")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), b"no /missing");
    }

    #[tokio::test]
    async fn wrong_method_lists_allowed_methods() {
        let router = Router::new().delete("/apps/:id", ok).get("/apps/:id", ok);
        let res = router.dispatch(request(http::Method::PUT, "/apps/1")).await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET, DELETE"));
    }

    #[tokio::test]
    async fn options_is_answered_automatically() {
        let router = Router::new().post("/apps", ok);
        let res = router.dispatch(request(http::Method::OPTIONS, "/apps")).await;
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(res.header("allow"), Some("POST, OPTIONS"));

        let router = Router::new().post("/apps", ok).handle_options(false);
        let res = router.dispatch(request(http::Method::OPTIONS, "/apps")).await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn trailing_slash_redirect_keeps_query() {
        let router = Router::new().get("/docs/", ok).post("/forms", ok).delete("/gone/", ok);

        let res = router.dispatch(request(http::Method::GET, "/docs?page=2")).await;
        assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("location"), Some("/docs/?page=2"));

        let res = router.dispatch(request(http::Method::POST, "/forms/")).await;
        assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("location"), Some("/forms"));

        let res = router.dispatch(request(http::Method::DELETE, "/gone")).await;
        assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("location"), Some("/gone/"));
    }

    #[tokio::test]
    async fn panicking_handler_answers_500() {
        async fn boom(_: Request) -> &'static str {
            panic!("boom")
        }

        let router = Router::new().get("/boom", boom).get("/ok", ok);
        let res = router.dispatch(request(http::Method::GET, "/boom")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = router.dispatch(request(http::Method::GET, "/ok")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cancelled_request_never_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().get("/slow/:id", move |_: Ctx, _: u32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "done"
            }
        });

        let token = CancellationToken::new();
        token.cancel();
        let req = request(http::Method::GET, "/slow/1").with_cancellation(token);
        let res = router.dispatch(req).await;
        assert_eq!(res.status_code().as_u16(), 499);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let res = router.dispatch(request(http::Method::GET, "/slow/1")).await;
        assert_eq!(res.body(), b"done");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    static STALLED_HANDLER_RUNS: AtomicUsize = AtomicUsize::new(0);

    /// A context whose body never finishes decoding.
    struct Stalled {
        req: Request,
    }

    impl Context for Stalled {
        fn create(req: Request) -> Self {
            Self { req }
        }

        fn request(&self) -> &Request {
            &self.req
        }

        async fn decode(&mut self) -> Result<(), Rejection> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancellation_during_decode_wins() {
        async fn upload(_: Stalled, _: u32) -> &'static str {
            STALLED_HANDLER_RUNS.fetch_add(1, Ordering::SeqCst);
            "stored"
        }

        let router = Router::new().put("/uploads/:id", upload);
        let token = CancellationToken::new();
        let req = request(http::Method::PUT, "/uploads/9").with_cancellation(token.clone());

        let (res, ()) = tokio::join!(router.dispatch(req), async {
            tokio::task::yield_now().await;
            token.cancel();
        });
        assert_eq!(res.status_code().as_u16(), 499);
        assert_eq!(STALLED_HANDLER_RUNS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handle_buffers_raw_bodies() {
        let router = Router::new().post("/echo", |req: Request| async move { req.body().to_vec() });
        let raw = http::Request::post("/echo").body(Full::new(Bytes::from_static(b"ping"))).unwrap();
        let res = router.handle(raw).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ping");
    }
}
