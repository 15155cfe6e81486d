//! Static development server with live reload for tss.
//!
//! This crate serves a directory over HTTP and, while live reload is
//! enabled, tells open browser tabs to reload when watched files change.
//!
//! # Quick Start
//!
//! ```ignore
//! use tss_server::{DevServer, Options};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = DevServer::new();
//!     server.configure(
//!         Options::new()
//!             .root("public")
//!             .port(5000)
//!             .on_reload(|| tracing::info!("reloaded")),
//!     )?;
//!     server.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► static server (host:port)
//!    │                   ├─► user middleware
//!    │                   ├─► reload <script> injection
//!    │                   └─► ServeDir / directory listing
//!    │
//!    └──WebSocket──► change notifier (host:live_reload.port)
//!                        ▲
//!                        └── watch binding (notify + debouncer)
//! ```

mod app;
mod controller;
mod error;
mod launcher;
mod live_reload;
mod middleware;
mod options;
mod serve;
mod state;
mod static_files;

pub use app::App;
pub use controller::{DevServer, ServerState, StartOutcome, StopOutcome};
pub use error::ServerError;
pub use launcher::{BrowserLauncher, SystemBrowser, page_url};
pub use live_reload::{Broadcaster, FileChange, FileStat, FsEventKind, ReloadEvent, WatchEvent};
pub use middleware::Middleware;
pub use options::{
    ChangeHook, Filter, Hook, Hooks, OpenHook, Options, ServerConfig, StartHook, ignore_filter,
};
pub use tss_config::{ConfigError, Settings};
