//! Server lifecycle.
//!
//! [`DevServer`] owns the run state and sequences the three services of a
//! run: the change notifier and the watch binding (when live reload is
//! enabled) and the static server. Every transition takes `&mut self`, so
//! nothing here needs locking.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tss_config::ConfigError;
use url::Url;

use crate::app::App;
use crate::error::ServerError;
use crate::launcher::{self, BrowserLauncher, SystemBrowser};
use crate::live_reload::{LiveReload, ReloadEvent};
use crate::options::{Options, ServerConfig};
use crate::serve::{self, ServeHandle};

/// Run state of a [`DevServer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Running,
}

/// Result of [`DevServer::start`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// The server is now listening on `addr`.
    Started { addr: SocketAddr },
    /// The server was already running. Nothing happened.
    AlreadyRunning,
}

/// Result of [`DevServer::stop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The server was not running. Nothing happened.
    AlreadyStopped,
}

/// Whether a start may open the browser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpenBrowser {
    Configured,
    Suppressed,
}

/// Services of the current run.
struct ActiveRun {
    /// Configuration the run was started with.
    config: Arc<ServerConfig>,
    http: ServeHandle,
    live_reload: Option<LiveReload>,
}

/// Development server with live reload.
///
/// ```ignore
/// let mut server = DevServer::new();
/// server.configure(Options::new().root("public").port(5000))?;
/// server.start().await?;
/// // ...
/// server.stop().await;
/// ```
pub struct DevServer {
    config: Option<Arc<ServerConfig>>,
    run: Option<ActiveRun>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl Default for DevServer {
    fn default() -> Self {
        Self::new()
    }
}

impl DevServer {
    /// Unconfigured server that opens pages in the system browser.
    #[must_use]
    pub fn new() -> Self {
        Self::with_launcher(Arc::new(SystemBrowser))
    }

    /// Unconfigured server using `launcher` to open pages.
    #[must_use]
    pub fn with_launcher(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            config: None,
            run: None,
            launcher,
        }
    }

    /// Replace the configuration.
    ///
    /// A running server keeps the configuration it was started with until
    /// the next start. On error the previous configuration is kept.
    pub fn configure(&mut self, options: Options) -> Result<(), ConfigError> {
        let config = ServerConfig::resolve(options)?;
        tracing::debug!(?config, "Configured");
        self.config = Some(Arc::new(config));
        Ok(())
    }

    pub fn state(&self) -> ServerState {
        if self.run.is_some() {
            ServerState::Running
        } else {
            ServerState::Stopped
        }
    }

    /// The configuration the next start will use.
    pub fn config(&self) -> Option<&ServerConfig> {
        self.config.as_deref()
    }

    /// Address the static server is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.run.as_ref().map(|run| run.http.local_addr())
    }

    /// Address the change notifier is bound to, while running with live
    /// reload.
    pub fn live_reload_addr(&self) -> Option<SocketAddr> {
        self.live_reload().map(LiveReload::local_addr)
    }

    /// Subscribe to reload broadcasts of the current run.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ReloadEvent>> {
        self.live_reload().map(LiveReload::subscribe)
    }

    /// Start serving.
    ///
    /// # Errors
    ///
    /// [`ServerError::NotConfigured`] before [`configure`](Self::configure);
    /// bind and watch failures otherwise. Nothing is left running on error.
    pub async fn start(&mut self) -> Result<StartOutcome, ServerError> {
        self.start_with(OpenBrowser::Configured).await
    }

    /// Stop serving and run `on_stop`.
    pub async fn stop(&mut self) -> StopOutcome {
        let Some(run) = self.run.take() else {
            tracing::info!("Server is not running");
            return StopOutcome::AlreadyStopped;
        };

        let ActiveRun {
            config,
            http,
            live_reload,
        } = run;

        http.shutdown().await;
        if let Some(live_reload) = live_reload {
            live_reload.stop().await;
        }
        tracing::info!("Server stopped");

        config.hooks.stop();
        StopOutcome::Stopped
    }

    /// Stop, then start again without opening the browser, then run
    /// `on_restart`.
    pub async fn restart(&mut self) -> Result<StartOutcome, ServerError> {
        self.stop().await;
        let outcome = self.start_with(OpenBrowser::Suppressed).await?;

        if let Some(run) = &self.run {
            run.config.hooks.restart();
        }
        Ok(outcome)
    }

    /// Tell every connected browser to reload and run `on_reload`.
    ///
    /// Returns `false`, doing nothing, unless live reload is active.
    pub fn reload(&self) -> bool {
        let Some(run) = &self.run else {
            return false;
        };
        let Some(live_reload) = &run.live_reload else {
            return false;
        };

        let clients = live_reload.broadcast_change(&[".".to_owned()]);
        tracing::info!(clients, "Reload requested");
        run.config.hooks.reload();
        true
    }

    /// Open `path` of the running server in the browser and run `on_open`.
    ///
    /// An empty path does nothing. Returns the opened URL.
    pub fn open(&self, path: &str) -> Result<Option<Url>, ServerError> {
        if path.is_empty() {
            return Ok(None);
        }
        let config = self.active_config().ok_or(ServerError::NotConfigured)?;
        let port = self
            .local_addr()
            .map_or(config.settings.port, |addr| addr.port());

        let url = launcher::page_url(&config.settings.host, port, path)?;
        self.launcher
            .launch(url.as_str())
            .map_err(ServerError::Browser)?;
        tracing::info!(url = %url, "Opened browser");

        config.hooks.open(url.as_str());
        Ok(Some(url))
    }

    async fn start_with(&mut self, open: OpenBrowser) -> Result<StartOutcome, ServerError> {
        let Some(config) = self.config.clone() else {
            tracing::warn!("Options have not been set, configure the server first");
            return Err(ServerError::NotConfigured);
        };
        if self.run.is_some() {
            tracing::info!("Server is already running, stop it first");
            return Ok(StartOutcome::AlreadyRunning);
        }
        let settings = &config.settings;

        let live_reload = if settings.live_reload.enable {
            Some(LiveReload::start(&config).await?)
        } else {
            None
        };

        let mut app = App::new(&config);
        config.hooks.start(&mut app);
        let router = app.into_router(
            &config,
            live_reload.as_ref().map(|lr| lr.local_addr().port()),
        );

        let listener = match serve::bind("static server", &settings.host, settings.port).await {
            Ok(listener) => listener,
            Err(e) => {
                if let Some(live_reload) = live_reload {
                    live_reload.stop().await;
                }
                return Err(e);
            }
        };
        let (shutdown, _) = watch::channel(false);
        let http = ServeHandle::spawn("static server", listener, router, shutdown)?;
        let addr = http.local_addr();

        self.run = Some(ActiveRun {
            config: Arc::clone(&config),
            http,
            live_reload,
        });
        tracing::info!(address = %addr, root = %settings.root.display(), "Server started");

        if open == OpenBrowser::Configured
            && let Some(path) = &settings.open
            && let Err(e) = self.open(path)
        {
            tracing::warn!(error = %e, "Failed to open browser");
        }

        Ok(StartOutcome::Started { addr })
    }

    fn live_reload(&self) -> Option<&LiveReload> {
        self.run.as_ref()?.live_reload.as_ref()
    }

    /// Configuration of the current run, or the pending one when stopped.
    fn active_config(&self) -> Option<&ServerConfig> {
        match &self.run {
            Some(run) => Some(&run.config),
            None => self.config.as_deref(),
        }
    }
}
