//! HTTP methods that own a route tree.
//!
//! Only the verbs a route can be registered under are modelled here. Any other
//! method on the wire (`HEAD`, `OPTIONS`, extension methods) never matches a
//! tree directly; the router answers it with `405 Method Not Allowed` or `404`.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Every routable method, in the order used when listing allowed methods.
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get    => "GET",
            Self::Post   => "POST",
            Self::Put    => "PUT",
            Self::Patch  => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Maps a wire method onto a routable one, if it is one.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET    => Some(Self::Get),
            http::Method::POST   => Some(Self::Post),
            http::Method::PUT    => Some(Self::Put),
            http::Method::PATCH  => Some(Self::Patch),
            http::Method::DELETE => Some(Self::Delete),
            _                    => None,
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET"    => Ok(Self::Get),
            "POST"   => Ok(Self::Post),
            "PUT"    => Ok(Self::Put),
            "PATCH"  => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _        => Err(()),
        }
    }
}

impl From<Method> for http::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get    => http::Method::GET,
            Method::Post   => http::Method::POST,
            Method::Put    => http::Method::PUT,
            Method::Patch  => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_http() {
        for m in Method::ALL {
            let wire: http::Method = m.into();
            assert_eq!(wire.as_str(), m.as_str());
            assert_eq!(Method::from_http(&wire), Some(m));
            assert_eq!(m.as_str().parse::<Method>(), Ok(m));
        }
    }

    #[test]
    fn unroutable_methods_are_rejected() {
        assert_eq!(Method::from_http(&http::Method::HEAD), None);
        assert_eq!(Method::from_http(&http::Method::OPTIONS), None);
        assert!("get".parse::<Method>().is_err());
    }
}
