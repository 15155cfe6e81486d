//! Notifier state.
//!
//! Shared state for the change-notifier handlers.

use tokio::sync::watch;

use crate::live_reload::Broadcaster;

/// State shared across the notifier's handlers.
#[derive(Clone)]
pub(crate) struct NotifierState {
    /// Fan-out channel to connected clients.
    pub(crate) broadcaster: Broadcaster,
    /// Flips to `true` when the notifier stops listening.
    pub(crate) shutdown: watch::Receiver<bool>,
}
