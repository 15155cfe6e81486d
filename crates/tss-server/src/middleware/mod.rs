//! Request middleware.
//!
//! [`Middleware`] wraps a caller-supplied async handler. The configured list
//! runs in the order given, ahead of reload-script injection and static
//! serving. A handler either answers the request itself or passes it on with
//! [`Next::run`].

pub(crate) mod headers;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{Next, from_fn};
use axum::response::Response;

type BoxResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

type Handler = dyn Fn(Request, Next) -> BoxResponseFuture + Send + Sync;

/// A request handler in the middleware pipeline.
///
/// ```ignore
/// let log_requests = Middleware::new(|request, next| async move {
///     tracing::info!(path = %request.uri().path(), "request");
///     next.run(request).await
/// });
/// ```
#[derive(Clone)]
pub struct Middleware {
    handler: Arc<Handler>,
}

impl Middleware {
    /// Wrap an async handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |request: Request, next: Next| -> BoxResponseFuture {
                Box::pin(handler(request, next))
            }),
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").finish_non_exhaustive()
    }
}

/// Layer `middleware` onto `router` so the first entry sees requests first.
pub(crate) fn apply(router: Router, middleware: &[Middleware]) -> Router {
    // The last layer added is the outermost, so add them back to front.
    middleware.iter().rev().fold(router, |router, middleware| {
        let handler = Arc::clone(&middleware.handler);
        router.layer(from_fn(move |request: Request, next: Next| {
            handler(request, next)
        }))
    })
}
