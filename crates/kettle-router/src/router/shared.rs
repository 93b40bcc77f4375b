use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use super::{RouteMatch, Router, RouterBuilder};
use crate::error::{ConstructionError, DispatchError};
use crate::request::RouteRequest;

/// A router shared between request threads and a registering thread
///
/// Readers take a snapshot with [`load`](Self::load) and never block.
/// Writers rebuild a copy and publish it atomically; a dispatch that is
/// already running keeps the router it started with.
///
/// # Examples
///
/// ```
/// use kettle_router::{Routable, RouteRequest, Router, SharedRouter};
///
/// let shared = SharedRouter::new(Router::builder().build());
/// shared.update(|builder| {
///     builder.register(&Routable::new("health", "/health"), "ok")?;
///     Ok(())
/// })?;
///
/// let request = RouteRequest::get("/health").unwrap();
/// assert_eq!(*shared.dispatch(&request).unwrap().handler(), "ok");
/// # Ok::<(), kettle_router::ConstructionError>(())
/// ```
pub struct SharedRouter<H> {
    current: ArcSwap<Router<H>>,
    writer: Mutex<()>,
}

impl<H> SharedRouter<H> {
    pub fn new(router: Router<H>) -> Self {
        Self {
            current: ArcSwap::from_pointee(router),
            writer: Mutex::new(()),
        }
    }

    /// Snapshot of the currently published router
    pub fn load(&self) -> Arc<Router<H>> {
        self.current.load_full()
    }

    /// Applies registrations to a copy of the current router and publishes it
    ///
    /// Nothing is published if `apply` fails.
    pub fn update<F>(&self, apply: F) -> Result<(), ConstructionError>
    where
        F: FnOnce(&mut RouterBuilder<H>) -> Result<(), ConstructionError>,
    {
        let _guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut builder = self.current.load().to_builder();
        if let Err(err) = apply(&mut builder) {
            tracing::warn!("router update rejected: {}", err);
            return Err(err);
        }

        let router = builder.build();
        tracing::info!("publishing router with {} route(s)", router.len());
        self.current.store(Arc::new(router));
        Ok(())
    }

    /// Publishes a router built elsewhere
    pub fn replace(&self, router: Router<H>) {
        let _guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.current.store(Arc::new(router));
    }

    pub fn dispatch(&self, request: &RouteRequest) -> Result<RouteMatch<H>, DispatchError> {
        self.current.load().dispatch(request)
    }
}

impl<H> Default for SharedRouter<H> {
    fn default() -> Self {
        Self::new(Router::default())
    }
}
