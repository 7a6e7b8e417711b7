//! Registration while serving.
//!
//! A [`SharedRouter`] publishes immutable [`Router`] snapshots. Each request
//! loads the current snapshot once and routes against it to the end, so a
//! registration never changes the table under a request that is already
//! running. Writers are serialised; readers never wait for them.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use bytes::Bytes;
use http_body_util::Full;
use tracing::info;

use crate::error::{BoxError, RouteError};
use crate::handler::IntoEndpoint;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// A router that accepts new routes after serving has started.
///
/// Cloning is cheap and every clone sees the same table.
#[derive(Clone)]
pub struct SharedRouter {
    current: Arc<ArcSwap<Router>>,
    writer: Arc<Mutex<()>>,
}

impl SharedRouter {
    pub fn new(router: Router) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(router)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<Router> {
        self.current.load_full()
    }

    /// Adds one route. On error the published table is left untouched.
    pub fn register<M>(
        &self,
        method: Method,
        path: &str,
        handler: impl IntoEndpoint<M>,
    ) -> Result<(), RouteError> {
        let endpoint = handler.into_endpoint();
        self.update(|mut router| {
            router.insert(method, path, endpoint)?;
            Ok(router)
        })?;
        info!(%method, path, "route added while serving");
        Ok(())
    }

    /// Applies `f` to a copy of the current table and publishes the result,
    /// for batches of registrations or configuration changes that must land
    /// together.
    pub fn update(
        &self,
        f: impl FnOnce(Router) -> Result<Router, RouteError>,
    ) -> Result<(), RouteError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let next = f(Router::clone(&self.current.load()))?;
        self.current.store(Arc::new(next));
        Ok(())
    }

    pub async fn dispatch(&self, req: Request) -> Response {
        self.load().dispatch(req).await
    }

    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        self.load().handle(req).await
    }
}

impl From<Router> for SharedRouter {
    fn from(router: Router) -> Self {
        Self::new(router)
    }
}
