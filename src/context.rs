//! Per-request state for typed handlers.
//!
//! A typed handler's first argument is a [`Context`]: a value the dispatcher
//! builds fresh for every request, gives one chance to decode the body, and
//! then moves into the handler. Nothing is shared between requests.
//!
//! ```text
//! Context::create(req) → ctx.decode().await? → handler(ctx, params…)
//! ```
//!
//! Two contexts ship with the crate: [`Ctx`], which only holds the request,
//! and [`Json<T>`], which decodes the body as JSON. Anything else is a small
//! struct that implements the trait:
//!
//! ```rust
//! use switchyard::{Context, Rejection, Request};
//!
//! struct Upload {
//!     req: Request,
//!     lines: Vec<String>,
//! }
//!
//! impl Context for Upload {
//!     fn create(req: Request) -> Self {
//!         Self { req, lines: Vec::new() }
//!     }
//!
//!     fn request(&self) -> &Request {
//!         &self.req
//!     }
//!
//!     async fn decode(&mut self) -> Result<(), Rejection> {
//!         let text = std::str::from_utf8(self.req.body()).map_err(Rejection::decode)?;
//!         self.lines = text.lines().map(str::to_owned).collect();
//!         Ok(())
//!     }
//! }
//! ```

use std::future::{self, Future};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Rejection;
use crate::request::Request;
use crate::response::{Response, ResponseBuilder};

/// Per-request state handed to typed handlers.
pub trait Context: Send + Sized + 'static {
    /// Builds the state for one request.
    fn create(req: Request) -> Self;

    /// The request this context was built from.
    fn request(&self) -> &Request;

    /// Body-decode hook, run before the handler. An error answers `400` and
    /// the handler is never called. The default does nothing.
    fn decode(&mut self) -> impl Future<Output = Result<(), Rejection>> + Send {
        future::ready(Ok(()))
    }

    /// Named path parameter of the current request.
    fn param(&self, name: &str) -> Option<&str> {
        self.request().param(name)
    }

    /// `200 OK` plain-text response.
    fn text(&self, body: impl Into<String>) -> Response {
        Response::text(body)
    }

    /// `200 OK` JSON response.
    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Response {
        Response::json(value)
    }

    /// Response builder for custom status codes and headers.
    fn response(&self) -> ResponseBuilder {
        Response::builder()
    }
}

/// The plain context: the request and nothing else.
#[derive(Debug)]
pub struct Ctx {
    req: Request,
}

impl Ctx {
    pub fn into_request(self) -> Request {
        self.req
    }
}

impl Context for Ctx {
    fn create(req: Request) -> Self {
        Self { req }
    }

    fn request(&self) -> &Request {
        &self.req
    }
}

/// A context whose decode hook parses the body as JSON into `T`.
///
/// The body is always present once the handler runs; decode failures never
/// reach it.
#[derive(Debug)]
pub struct Json<T> {
    req: Request,
    body: Option<T>,
}

impl<T> Json<T> {
    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<T> {
        self.body
    }
}

impl<T: DeserializeOwned + Send + 'static> Context for Json<T> {
    fn create(req: Request) -> Self {
        Self { req, body: None }
    }

    fn request(&self) -> &Request {
        &self.req
    }

    fn decode(&mut self) -> impl Future<Output = Result<(), Rejection>> + Send {
        let outcome = match serde_json::from_slice::<T>(self.req.body()) {
            Ok(value) => {
                self.body = Some(value);
                Ok(())
            }
            Err(e) => Err(Rejection::decode(e)),
        };
        future::ready(outcome)
    }
}
