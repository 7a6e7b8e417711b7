//! Incoming HTTP request type.

use bytes::Bytes;
use http::{Extensions, HeaderMap, Uri};
use http_body_util::Full;
use tokio_util::sync::CancellationToken;

use crate::params::Params;

/// An incoming HTTP request with its body already buffered.
///
/// The dispatcher attaches the matched route's [`Params`] before any handler
/// sees the request, so plain handlers read them with [`Request::param`] or
/// [`Request::params`].
#[derive(Debug)]
pub struct Request {
    parts: http::request::Parts,
    body: Bytes,
    params: Params,
    cancel: CancellationToken,
}

impl Request {
    pub fn new(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            parts,
            body,
            params: Params::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Header value as text. Names are case-insensitive; non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All captured path parameters, in pattern order.
    pub fn params(&self) -> &Params { &self.params }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Ties the request to a host-side abort signal. Once `token` is
    /// cancelled the dispatcher stops before invoking the handler.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Converts back into a raw `http::Request`, carrying the params in its
    /// extensions where [`Params::of`] finds them.
    pub fn into_http(self) -> http::Request<Full<Bytes>> {
        let mut parts = self.parts;
        parts.extensions.insert(self.params);
        http::Request::from_parts(parts, Full::new(self.body))
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body)
    }
}
