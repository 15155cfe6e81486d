//! Error types for the development server.

use std::io;
use std::path::PathBuf;

use tss_config::ConfigError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `start()` was called before any configuration was applied.
    #[error("Server is not configured")]
    NotConfigured,

    /// Options could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A listener could not be bound.
    #[error("Failed to bind {what} on {host}:{port}: {source}")]
    Bind {
        /// Which listener ("static server" or "live reload").
        what: &'static str,
        /// Requested host.
        host: String,
        /// Requested port.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The watched directory could not be subscribed to.
    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        /// Watched directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: notify::Error,
    },

    /// The browser URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The browser could not be launched.
    #[error("Failed to open browser: {0}")]
    Browser(#[source] io::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
