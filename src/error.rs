//! Error types.
//!
//! Two classes exist and they never mix:
//!
//! - [`RouteError`] is raised while routes are being registered. It means the
//!   routing table is inconsistent and the process must not start serving.
//! - [`Rejection`] is produced while a single request is being dispatched. It
//!   turns into exactly one error response and affects no other request.
//!
//! Absence of a route is not an error at all; see
//! [`Resolution`](crate::Resolution).

use http::StatusCode;

use crate::params::ParamError;
use crate::response::{IntoResponse, Response};

/// Boxed error used where the concrete source type is the caller's choice.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Infrastructure failure returned by [`Server`](crate::Server): binding to a
/// port or accepting a connection.
#[derive(Debug, thiserror::Error)]
#[error("io: {0}")]
pub struct Error(#[from] std::io::Error);

/// A pattern that cannot be added to a route tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route pattern is empty")]
    Empty,

    #[error("route `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("route `{path}`: wildcard at byte {at} must directly follow `/`")]
    MisplacedWildcard { path: String, at: usize },

    #[error("route `{path}`: wildcard at byte {at} has an empty or invalid name")]
    InvalidParamName { path: String, at: usize },

    #[error("route `{path}`: parameter `{name}` appears more than once")]
    DuplicateParamName { path: String, name: String },

    #[error("route `{0}`: catch-all must be the last segment")]
    CatchAllNotLast(String),

    #[error("route `{path}`: parameter `:{new}` conflicts with existing `:{existing}`")]
    ParamConflict { path: String, existing: String, new: String },

    #[error("route `{0}`: catch-all conflicts with a sibling route at the same position")]
    CatchAllConflict(String),

    #[error("route `{0}` is already registered")]
    Duplicate(String),

    #[error("route `{path}` captures {captured} parameter(s) but its handler declares {declared}")]
    ArityMismatch { path: String, captured: usize, declared: usize },
}

/// A request-time failure that short-circuits dispatch before the handler runs.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    /// The request body could not be turned into the context's body value.
    #[error("failed to decode request body: {0}")]
    Decode(#[source] BoxError),

    /// A captured path segment did not convert to the declared type.
    #[error("path parameter #{position} (`{name}`): {source}")]
    Param {
        position: usize,
        name: String,
        #[source]
        source: ParamError,
    },

    /// The host aborted the request before the handler was invoked.
    #[error("request cancelled before the handler ran")]
    Cancelled,
}

impl Rejection {
    /// Wraps any decoding error.
    pub fn decode(err: impl Into<BoxError>) -> Self {
        Self::Decode(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::Param { .. } => StatusCode::BAD_REQUEST,
            // nginx's "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        Response::builder().status(self.status()).text(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_failures_map_to_bad_request() {
        let r = Rejection::decode("unexpected end of input");
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);

        let r = Rejection::Param {
            position: 0,
            name: "id".into(),
            source: ParamError::new("abc", "u64", "invalid digit found in string"),
        };
        let res = r.into_response();
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert!(String::from_utf8_lossy(res.body()).contains("`id`"));
    }

    #[test]
    fn cancellation_uses_client_closed_status() {
        assert_eq!(Rejection::Cancelled.status().as_u16(), 499);
    }
}
