//! Live reload.
//!
//! Two cooperating services: a [change notifier](notifier) that browsers
//! connect to, and a [watch binding](watcher) over the watched directory.
//! Accepted changes are forwarded by [`ChangeForwarder`] to the notifier,
//! then to the `on_reload` hook, then to the user's change callback.

mod debouncer;
mod inject;
mod notifier;
mod watcher;
mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

pub use debouncer::FsEventKind;
pub(crate) use inject::inject_script;
pub use notifier::{Broadcaster, ReloadEvent};
pub use watcher::{FileChange, FileStat, WatchEvent};

use crate::error::ServerError;
use crate::options::ServerConfig;
use notifier::ChangeNotifier;
use watcher::WatchBinding;

/// Routes watch events into reload broadcasts and user hooks.
pub(crate) struct ChangeForwarder {
    broadcaster: Broadcaster,
    config: Arc<ServerConfig>,
}

impl ChangeForwarder {
    pub(crate) fn new(broadcaster: Broadcaster, config: Arc<ServerConfig>) -> Self {
        Self {
            broadcaster,
            config,
        }
    }

    /// Forward one watch event. Returns whether anything was forwarded.
    pub(crate) fn forward(&self, event: &WatchEvent) -> bool {
        let WatchEvent::Changed(change) = event else {
            return false;
        };

        let file = change.path.to_string_lossy().into_owned();
        let clients = self.broadcaster.broadcast_change(&[file]);
        tracing::info!(
            path = %change.path.display(),
            kind = ?change.kind,
            clients,
            "File changed"
        );

        self.config.hooks.reload();
        if let Some(callback) = &self.config.on_change {
            callback(&change.path, change.current.as_ref(), change.previous.as_ref());
        }
        true
    }
}

/// Running live reload services.
pub(crate) struct LiveReload {
    notifier: ChangeNotifier,
    watch: WatchBinding,
}

impl LiveReload {
    /// Start the notifier, then bind the watcher.
    ///
    /// If the watcher cannot be bound the notifier is stopped again.
    pub(crate) async fn start(config: &Arc<ServerConfig>) -> Result<Self, ServerError> {
        let settings = &config.settings;
        let notifier =
            ChangeNotifier::start_listening(&settings.host, settings.live_reload.port).await?;

        let forwarder = ChangeForwarder::new(notifier.broadcaster().clone(), Arc::clone(config));
        let watch = WatchBinding::bind(
            &settings.live_reload.directory,
            Arc::clone(&config.filter),
            settings.live_reload.ignore_dot_files,
            Duration::from_millis(settings.live_reload.debounce_ms),
            move |event| {
                forwarder.forward(&event);
            },
        );

        match watch {
            Ok(watch) => Ok(Self { notifier, watch }),
            Err(e) => {
                notifier.stop_listening().await;
                Err(e)
            }
        }
    }

    pub(crate) fn broadcast_change(&self, files: &[String]) -> usize {
        self.notifier.broadcast_change(files)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.notifier.broadcaster().subscribe()
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.notifier.local_addr()
    }

    pub(crate) async fn stop(self) {
        self.notifier.stop_listening().await;
        self.watch.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, PoisonError};

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Forwarder whose hooks log into the returned vector. `on_reload`
    /// records whether the broadcast was already sent.
    fn forwarder() -> (ChangeForwarder, broadcast::Receiver<ReloadEvent>, Log) {
        let log: Log = Arc::default();
        let broadcaster = Broadcaster::new();
        let rx = broadcaster.subscribe();
        let probe = Arc::new(Mutex::new(broadcaster.subscribe()));

        let reload_log = Arc::clone(&log);
        let change_log = Arc::clone(&log);
        let options = Options::new()
            .on_reload(move || {
                let broadcast_seen = probe
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .try_recv()
                    .is_ok();
                push(&reload_log, format!("reload broadcast_seen={broadcast_seen}"));
            })
            .on_change(move |path, current, previous| {
                push(
                    &change_log,
                    format!(
                        "change {} current={} previous={}",
                        path.display(),
                        current.is_some(),
                        previous.is_some()
                    ),
                );
            });
        let config = Arc::new(ServerConfig::resolve(options).unwrap());

        (ChangeForwarder::new(broadcaster, config), rx, log)
    }

    fn change(path: &str) -> WatchEvent {
        WatchEvent::Changed(FileChange {
            path: PathBuf::from(path),
            kind: FsEventKind::Created,
            current: Some(FileStat {
                len: 3,
                modified: None,
                is_dir: false,
            }),
            previous: None,
        })
    }

    #[test]
    fn test_scan_complete_not_forwarded() {
        let (forwarder, mut rx, log) = forwarder();

        let event = WatchEvent::ScanComplete {
            files: HashMap::from([(
                PathBuf::from("/site/index.html"),
                FileStat {
                    len: 1,
                    modified: None,
                    is_dir: false,
                },
            )]),
        };

        assert!(!forwarder.forward(&event));
        assert!(rx.try_recv().is_err());
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_change_broadcast_then_reload_then_callback() {
        let (forwarder, mut rx, log) = forwarder();

        assert!(forwarder.forward(&change("/site/index.html")));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.files, vec!["/site/index.html".to_owned()]);
        assert!(rx.try_recv().is_err());
        assert_eq!(
            entries(&log),
            vec![
                "reload broadcast_seen=true".to_owned(),
                "change /site/index.html current=true previous=false".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_start_fails_for_missing_watch_directory() {
        let options = Options::new()
            .host("127.0.0.1")
            .live_reload_port(0)
            .watch_directory(Path::new("/nonexistent/tss-live-reload"));
        let config = Arc::new(ServerConfig::resolve(options).unwrap());

        let err = LiveReload::start(&config).await.err().unwrap();
        assert!(matches!(err, ServerError::Watch { .. }));
    }
}
