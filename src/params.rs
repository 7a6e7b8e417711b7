//! Captured path parameters and their typed conversion.
//!
//! A match produces an ordered [`Params`] sequence, one entry per `:name` or
//! `*name` token in the pattern, in pattern order. Typed handlers receive the
//! values positionally through [`FromParam`]; plain and native handlers read
//! the same sequence out-of-band from the request.

use std::fmt;
use std::sync::Arc;

/// One captured `(name, value)` pair.
///
/// The value is the raw path text: no percent-decoding has happened yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    name: Arc<str>,
    value: String,
}

impl Param {
    pub fn name(&self) -> &str { &self.name }
    pub fn value(&self) -> &str { &self.value }
}

/// The ordered parameters captured for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    inner: Vec<Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: Arc<str>, value: impl Into<String>) {
        self.inner.push(Param { name, value: value.into() });
    }

    /// Value of the first parameter called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.iter().find(|p| &*p.name == name).map(Param::value)
    }

    /// Value at `index`, counting captures from the left of the pattern.
    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.inner.get(index).map(Param::value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize { self.inner.len() }
    pub fn is_empty(&self) -> bool { self.inner.is_empty() }

    /// Out-of-band accessor for native handlers: the params the dispatcher
    /// attached to a raw `http::Request` before invoking it.
    ///
    /// ```rust
    /// # use switchyard::Params;
    /// # fn handler(req: http::Request<()>) {
    /// let id = Params::of(&req).and_then(|p| p.get_index(0));
    /// # }
    /// ```
    pub fn of<B>(req: &http::Request<B>) -> Option<&Params> {
        req.extensions().get::<Params>()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

// ── Typed conversion ──────────────────────────────────────────────────────────

/// A captured segment that could not be converted to the declared type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{value}` is not a valid {expected}: {reason}")]
pub struct ParamError {
    value: String,
    expected: &'static str,
    reason: String,
}

impl ParamError {
    pub fn new(value: impl Into<String>, expected: &'static str, reason: impl fmt::Display) -> Self {
        Self { value: value.into(), expected, reason: reason.to_string() }
    }

    pub fn value(&self) -> &str { &self.value }
    pub fn expected(&self) -> &'static str { self.expected }
}

/// Conversion from a raw path segment to a handler argument.
///
/// Implemented for `String` (percent-decoded), every integer width, floats,
/// `bool` and `char`. Implement it for your own types to accept them as
/// typed handler parameters:
///
/// ```rust
/// use switchyard::{FromParam, ParamError};
///
/// struct Slug(String);
///
/// impl FromParam for Slug {
///     fn from_param(raw: &str) -> Result<Self, ParamError> {
///         if raw.bytes().all(|b| b.is_ascii_lowercase() || b == b'-') {
///             Ok(Slug(raw.to_owned()))
///         } else {
///             Err(ParamError::new(raw, "slug", "expected lowercase letters and dashes"))
///         }
///     }
/// }
/// ```
pub trait FromParam: Sized {
    fn from_param(raw: &str) -> Result<Self, ParamError>;
}

impl FromParam for String {
    fn from_param(raw: &str) -> Result<Self, ParamError> {
        urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .map_err(|e| ParamError::new(raw, "UTF-8 string", e))
    }
}

macro_rules! from_param_via_from_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromParam for $ty {
                fn from_param(raw: &str) -> Result<Self, ParamError> {
                    raw.parse::<$ty>()
                        .map_err(|e| ParamError::new(raw, stringify!($ty), e))
                }
            }
        )*
    };
}

from_param_via_from_str!(
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64, bool, char,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        let mut p = Params::new();
        for (k, v) in pairs {
            p.push(Arc::from(*k), *v);
        }
        p
    }

    #[test]
    fn lookup_by_name_and_position() {
        let p = params(&[("org", "acme"), ("repo", "anvil")]);
        assert_eq!(p.get("repo"), Some("anvil"));
        assert_eq!(p.get_index(0), Some("acme"));
        assert_eq!(p.get("missing"), None);
        assert_eq!(p.get_index(2), None);
        let names: Vec<_> = p.iter().map(Param::name).collect();
        assert_eq!(names, ["org", "repo"]);
    }

    #[test]
    fn out_of_band_accessor_reads_extensions() {
        let mut req = http::Request::new(());
        assert!(Params::of(&req).is_none());
        req.extensions_mut().insert(params(&[("id", "7")]));
        assert_eq!(Params::of(&req).and_then(|p| p.get("id")), Some("7"));
    }

    #[test]
    fn integers_reject_text() {
        assert_eq!(u64::from_param("42"), Ok(42));
        assert_eq!(i32::from_param("-3"), Ok(-3));
        let err = u64::from_param("abc").unwrap_err();
        assert_eq!(err.value(), "abc");
        assert_eq!(err.expected(), "u64");
        assert!(u8::from_param("256").is_err());
    }

    #[test]
    fn strings_are_percent_decoded() {
        assert_eq!(String::from_param("hello%20world").unwrap(), "hello world");
        assert_eq!(String::from_param("plain").unwrap(), "plain");
        assert!(String::from_param("%FF").is_err());
    }
}
