//! Route registration and resolution.
//!
//! One radix tree per HTTP method. Registration validates everything it can
//! up front: pattern syntax, conflicts with routes already in the tree, and
//! whether a typed handler declares as many parameters as the pattern
//! captures. A router that finished building cannot fail to route.

use std::collections::HashMap;

use tracing::debug;

use crate::error::RouteError;
use crate::handler::{Endpoint, IntoEndpoint};
use crate::method::Method;
use crate::params::Params;
use crate::tree::{self, Lookup, Tree};

/// The application router.
///
/// Build it once at startup, then share it read-only: [`Router::dispatch`]
/// takes `&self`. Each registration call returns `self` so registrations
/// chain naturally.
///
/// ```rust
/// use switchyard::{Ctx, Context, Request, Response, Router};
///
/// async fn show(ctx: Ctx, org: String, id: u64) -> Response {
///     ctx.text(format!("{org}/{id}"))
/// }
///
/// async fn index(_: Request) -> &'static str {
///     "index"
/// }
///
/// let router = Router::new()
///     .get("/", index)
///     .get("/orgs/:org/apps/:id", show);
/// assert_eq!(router.routes().count(), 2);
/// ```
#[derive(Clone)]
pub struct Router {
    trees: HashMap<Method, Tree<Endpoint>>,
    routes: Vec<(Method, String)>,
    not_found: Option<Endpoint>,
    redirect_trailing_slash: bool,
    handle_method_not_allowed: bool,
    handle_options: bool,
}

/// Outcome of looking up a method and path.
#[derive(Debug)]
pub enum Resolution<'r> {
    /// A handler was found; `params` holds the captured values in pattern order.
    Matched { endpoint: &'r Endpoint, params: Params },
    /// The path only matches with its trailing slash added or removed.
    Redirect { location: String },
    /// The path exists, but not for this method.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            routes: Vec::new(),
            not_found: None,
            redirect_trailing_slash: true,
            handle_method_not_allowed: true,
            handle_options: true,
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `:name` for one segment and `*name` for the rest
    /// of the path.
    ///
    /// # Panics
    ///
    /// Panics if the route cannot be registered. Use [`Router::try_on`] to
    /// handle the [`RouteError`] instead.
    pub fn on<M>(self, method: Method, path: &str, handler: impl IntoEndpoint<M>) -> Self {
        self.try_on(method, path, handler)
            .unwrap_or_else(|e| panic!("invalid route: {e}"))
    }

    /// Fallible form of [`Router::on`].
    pub fn try_on<M>(
        mut self,
        method: Method,
        path: &str,
        handler: impl IntoEndpoint<M>,
    ) -> Result<Self, RouteError> {
        self.insert(method, path, handler.into_endpoint())?;
        Ok(self)
    }

    pub fn get<M>(self, path: &str, handler: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post<M>(self, path: &str, handler: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put<M>(self, path: &str, handler: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn patch<M>(self, path: &str, handler: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Patch, path, handler)
    }

    pub fn delete<M>(self, path: &str, handler: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Registers one handler under every routable method.
    ///
    /// # Panics
    ///
    /// Panics if any of the registrations fails.
    pub fn all<M>(self, path: &str, handler: impl IntoEndpoint<M>) -> Self {
        self.try_all(path, handler)
            .unwrap_or_else(|e| panic!("invalid route: {e}"))
    }

    /// Fallible form of [`Router::all`]. Nothing is registered on failure.
    pub fn try_all<M>(self, path: &str, handler: impl IntoEndpoint<M>) -> Result<Self, RouteError> {
        let endpoint = handler.into_endpoint();
        let mut next = self.clone();
        for method in Method::ALL {
            next.insert(method, path, endpoint.clone())?;
        }
        Ok(next)
    }

    /// Handler for requests no route matches. Without one they answer `404`.
    ///
    /// # Panics
    ///
    /// Panics if `handler` is typed and declares parameters; a miss captures
    /// none.
    pub fn not_found<M>(self, handler: impl IntoEndpoint<M>) -> Self {
        self.try_not_found(handler)
            .unwrap_or_else(|e| panic!("invalid fallback: {e}"))
    }

    /// Fallible form of [`Router::not_found`].
    pub fn try_not_found<M>(mut self, handler: impl IntoEndpoint<M>) -> Result<Self, RouteError> {
        let endpoint = handler.into_endpoint();
        if let Some(declared) = endpoint.arity().filter(|&n| n > 0) {
            return Err(RouteError::ArityMismatch { path: "<fallback>".to_owned(), captured: 0, declared });
        }
        self.not_found = Some(endpoint);
        Ok(self)
    }

    /// Redirect `/a/` to `/a` (and back) when only the other form is
    /// registered. On by default; when off such requests answer `404`.
    pub fn redirect_trailing_slash(mut self, enabled: bool) -> Self {
        self.redirect_trailing_slash = enabled;
        self
    }

    /// Answer `405` with an `Allow` header when the path exists under other
    /// methods. On by default; when off such requests answer `404`.
    pub fn handle_method_not_allowed(mut self, enabled: bool) -> Self {
        self.handle_method_not_allowed = enabled;
        self
    }

    /// Answer `OPTIONS` with `204` and an `Allow` header for any registered
    /// path. On by default.
    pub fn handle_options(mut self, enabled: bool) -> Self {
        self.handle_options = enabled;
        self
    }

    /// Every registered route, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.routes.iter().map(|(m, p)| (*m, p.as_str()))
    }

    /// Looks up `path` for `method` without running anything.
    pub fn resolve(&self, method: &http::Method, path: &str) -> Resolution<'_> {
        let routable = Method::from_http(method);

        if let Some(tree) = routable.and_then(|m| self.trees.get(&m)) {
            match tree.find(path) {
                Lookup::Found(found) => {
                    return Resolution::Matched { endpoint: found.value, params: found.params };
                }
                Lookup::TrailingSlash if self.redirect_trailing_slash => {
                    return Resolution::Redirect { location: toggle_trailing_slash(path) };
                }
                Lookup::TrailingSlash | Lookup::NotFound => {}
            }
        }

        let probe = self.handle_method_not_allowed
            || (self.handle_options && method == http::Method::OPTIONS);
        if probe {
            let allowed = self.allowed(path, routable);
            if !allowed.is_empty() {
                return Resolution::MethodNotAllowed { allowed };
            }
        }
        Resolution::NotFound
    }

    /// Methods other than `except` whose tree has a route for `path`.
    fn allowed(&self, path: &str, except: Option<Method>) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| Some(*m) != except)
            .filter(|m| self.trees.get(m).is_some_and(|t| t.contains(path)))
            .collect()
    }

    pub(crate) fn insert(
        &mut self,
        method: Method,
        path: &str,
        endpoint: Endpoint,
    ) -> Result<(), RouteError> {
        let captured = tree::pattern_params(path)?.len();
        if let Some(declared) = endpoint.arity() {
            if declared != captured {
                return Err(RouteError::ArityMismatch { path: path.to_owned(), captured, declared });
            }
        }

        let shape = endpoint.shape();
        self.trees.entry(method).or_default().insert(path, endpoint)?;
        self.routes.push((method, path.to_owned()));
        debug!(%method, path, ?shape, "route registered");
        Ok(())
    }

    pub(crate) fn fallback(&self) -> Option<&Endpoint> {
        self.not_found.as_ref()
    }

    pub(crate) fn handles_options(&self) -> bool {
        self.handle_options
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn toggle_trailing_slash(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(trimmed) => trimmed.to_owned(),
        None => format!("{path}/"),
    }
}
