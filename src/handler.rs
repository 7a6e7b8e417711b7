//! Handler shapes and type erasure.
//!
//! # Three shapes, one contract
//!
//! A route can be served by any of:
//!
//! | Shape | Signature | Params arrive |
//! |---|---|---|
//! | typed | `async fn(C, T1, …, Tn) -> impl IntoResponse`, `C: Context`, `Ti: FromParam` | as arguments, by position |
//! | plain | `async fn(Request) -> impl IntoResponse` | via [`Request::params`] |
//! | native | [`Native`]`(service)` over `http::Request<Full<Bytes>>` | via [`Params::of`] |
//!
//! Registration turns each of them into an [`Endpoint`]: a descriptor that
//! records the shape and the declared parameter types, and owns the handler
//! behind one trait object.
//!
//! ```text
//! async fn show(ctx: Ctx, id: u64) -> Response { … }  ← user writes this
//!        ↓ router.get("/users/:id", show)
//! show.into_endpoint()                               ← IntoEndpoint impl for Fn(C, T1)
//!        ↓
//! Arc::new(TypedFn { f: show, … })                   ← binder built once
//!        ↓  stored as Arc<dyn ErasedHandler>
//! endpoint.call(req)  at request time                ← one vtable dispatch
//!        ↓
//! create ctx → decode → bind "42" as u64 → show(ctx, 42)
//! ```
//!
//! Parameter conversion is compiled into the binder for each arity; nothing
//! inspects types at request time.
//!
//! [`Request::params`]: crate::Request::params
//! [`Params::of`]: crate::Params::of

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use tracing::error;

use crate::context::Context;
use crate::dispatch::{bind, instantiate};
use crate::error::{BoxError, Rejection};
use crate::params::FromParam;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it is reachable from
/// the public [`Endpoint`] type. External crates cannot usefully implement it.
#[doc(hidden)]
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

// ── Descriptor ────────────────────────────────────────────────────────────────

/// How a handler wants to be called.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Context plus positional typed parameters.
    Typed,
    /// `Fn(Request)`, params out-of-band.
    Plain,
    /// A hyper service, params in request extensions.
    Native,
}

/// The immutable handler descriptor stored in the route tree.
#[derive(Clone)]
pub struct Endpoint {
    shape: Shape,
    param_types: Arc<[&'static str]>,
    handler: Arc<dyn ErasedHandler>,
}

impl Endpoint {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Type names of the declared positional parameters. Empty for plain and
    /// native handlers.
    pub fn param_types(&self) -> &[&'static str] {
        &self.param_types
    }

    /// Number of positional parameters, for typed handlers only.
    pub fn arity(&self) -> Option<usize> {
        (self.shape == Shape::Typed).then(|| self.param_types.len())
    }

    pub(crate) fn call(&self, req: Request) -> BoxFuture {
        self.handler.call(req)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("shape", &self.shape)
            .field("param_types", &self.param_types)
            .finish_non_exhaustive()
    }
}

// ── Public registration trait ─────────────────────────────────────────────────

/// Implemented for every value a route can be registered with.
///
/// You never implement this yourself. `M` is a marker that keeps the three
/// shapes apart; it is always inferred.
pub trait IntoEndpoint<M>: private::Sealed<M> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_endpoint(self) -> Endpoint;
}

mod private {
    pub trait Sealed<M> {}
}

#[doc(hidden)]
pub mod marker {
    use std::marker::PhantomData;

    #[derive(Debug)]
    pub enum Plain {}

    #[derive(Debug)]
    pub enum Native {}

    #[derive(Debug)]
    pub struct Typed<C, A>(PhantomData<fn() -> (C, A)>);
}

// ── Plain functions ───────────────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed<marker::Plain> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> IntoEndpoint<marker::Plain> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_endpoint(self) -> Endpoint {
        Endpoint {
            shape: Shape::Plain,
            param_types: Arc::from([]),
            handler: Arc::new(PlainFn(self)),
        }
    }
}

struct PlainFn<F>(F);

impl<F, Fut, R> ErasedHandler for PlainFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Native services ───────────────────────────────────────────────────────────

/// Wraps a hyper [`Service`](hyper::service::Service) so it can be mounted
/// as a route, typically under a catch-all.
///
/// The request reaches the service unchanged except for the matched
/// [`Params`](crate::Params) in its extensions. Service errors answer `500`.
#[derive(Clone, Debug)]
pub struct Native<S>(pub S);

impl<S, B> private::Sealed<marker::Native> for Native<S>
where
    S: hyper::service::Service<http::Request<Full<Bytes>>, Response = http::Response<B>>
        + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
}

impl<S, B> IntoEndpoint<marker::Native> for Native<S>
where
    S: hyper::service::Service<http::Request<Full<Bytes>>, Response = http::Response<B>>
        + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn into_endpoint(self) -> Endpoint {
        Endpoint {
            shape: Shape::Native,
            param_types: Arc::from([]),
            handler: Arc::new(self),
        }
    }
}

impl<S, B> ErasedHandler for Native<S>
where
    S: hyper::service::Service<http::Request<Full<Bytes>>, Response = http::Response<B>>
        + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = hyper::service::Service::call(&self.0, req.into_http());
        Box::pin(async move {
            let res = match fut.await {
                Ok(res) => res,
                Err(e) => {
                    let e: BoxError = e.into();
                    error!(error = %e, "native handler failed");
                    return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
                }
            };
            let (parts, body) = res.into_parts();
            match body.collect().await {
                Ok(collected) => Response::from_parts(parts, collected.to_bytes()),
                Err(e) => {
                    let e: BoxError = e.into();
                    error!(error = %e, "native handler body failed");
                    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        })
    }
}

// ── Typed context handlers ────────────────────────────────────────────────────

/// Binder for a typed handler: knows the context type `C` and the ordered
/// parameter types `A` of `f`.
struct TypedFn<F, C, A> {
    f: Arc<F>,
    _marker: PhantomData<fn() -> (C, A)>,
}

macro_rules! typed_handler {
    ($($arg:ident),*) => {
        impl<F, Fut, R, C, $($arg,)*> private::Sealed<marker::Typed<C, ($($arg,)*)>> for F
        where
            F: Fn(C, $($arg,)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoResponse + Send + 'static,
            C: Context,
            $($arg: FromParam + Send + 'static,)*
        {
        }

        impl<F, Fut, R, C, $($arg,)*> IntoEndpoint<marker::Typed<C, ($($arg,)*)>> for F
        where
            F: Fn(C, $($arg,)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoResponse + Send + 'static,
            C: Context,
            $($arg: FromParam + Send + 'static,)*
        {
            fn into_endpoint(self) -> Endpoint {
                Endpoint {
                    shape: Shape::Typed,
                    param_types: Arc::from([$(type_name::<$arg>(),)*]),
                    handler: Arc::new(TypedFn::<F, C, ($($arg,)*)> {
                        f: Arc::new(self),
                        _marker: PhantomData,
                    }),
                }
            }
        }

        impl<F, Fut, R, C, $($arg,)*> ErasedHandler for TypedFn<F, C, ($($arg,)*)>
        where
            F: Fn(C, $($arg,)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoResponse + Send + 'static,
            C: Context,
            $($arg: FromParam + Send + 'static,)*
        {
            #[allow(non_snake_case, unused_mut, unused_assignments, unused_variables)]
            fn call(&self, req: Request) -> BoxFuture {
                let f = Arc::clone(&self.f);
                Box::pin(async move {
                    let ctx = match instantiate::<C>(req).await {
                        Ok(v) => v,
                        Err(rejection) => return rejection.into_response(),
                    };

                    let mut position = 0;
                    $(
                        let $arg = match bind::<$arg>(ctx.request().params(), position) {
                            Ok(v) => v,
                            Err(rejection) => return rejection.into_response(),
                        };
                        position += 1;
                    )*

                    if ctx.request().is_cancelled() {
                        return Rejection::Cancelled.into_response();
                    }
                    f(ctx, $($arg,)*).await.into_response()
                })
            }
        }
    };
}

typed_handler!();
typed_handler!(T1);
typed_handler!(T1, T2);
typed_handler!(T1, T2, T3);
typed_handler!(T1, T2, T3, T4);
typed_handler!(T1, T2, T3, T4, T5);
typed_handler!(T1, T2, T3, T4, T5, T6);
typed_handler!(T1, T2, T3, T4, T5, T6, T7);
typed_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
