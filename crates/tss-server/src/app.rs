//! Router construction.
//!
//! The static app is assembled in two steps. [`App::new`] mounts static
//! serving over the root and is handed to the `on_start` hook, which may add
//! routes of its own. [`App::into_router`] then wraps everything, the hook's
//! routes included, in the shared layers:
//!
//! ```text
//! request ─► user middleware (in order) ─► reload script injection
//!         ─► trace ─► Cache-Control ─► routes / ServeDir / listing
//! ```

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::MethodRouter;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::live_reload;
use crate::middleware::{self, headers};
use crate::options::ServerConfig;
use crate::static_files;

/// The static server's application, as seen by the `on_start` hook.
#[derive(Debug, Default)]
pub struct App {
    router: Router,
}

impl App {
    /// Static serving for `config`'s root.
    pub(crate) fn new(config: &ServerConfig) -> Self {
        let settings = &config.settings;
        Self {
            router: static_files::static_router(&settings.root, settings.indexes),
        }
    }

    /// Add a route. Routes take precedence over static files.
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> &mut Self {
        self.router = std::mem::take(&mut self.router).route(path, method_router);
        self
    }

    /// Merge another router's routes.
    pub fn merge(&mut self, other: Router) -> &mut Self {
        self.router = std::mem::take(&mut self.router).merge(other);
        self
    }

    /// Wrap the app in the shared layers.
    ///
    /// `live_reload_port` is the notifier's bound port; `None` disables
    /// script injection.
    pub(crate) fn into_router(self, config: &ServerConfig, live_reload_port: Option<u16>) -> Router {
        let mut router = self.router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(headers::no_cache_layer()),
        );

        if let Some(port) = live_reload_port {
            router = router.layer(from_fn_with_state(port, live_reload::inject_script));
        }

        middleware::apply(router, &config.middleware)
    }
}
