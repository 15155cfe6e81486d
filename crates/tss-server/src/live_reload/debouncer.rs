//! Per-path debouncing of raw watcher events.
//!
//! Editors rarely save a file with a single syscall: a save can show up as a
//! create, a couple of modifies and a metadata change within a few
//! milliseconds. Events are held per path until the path has been quiet for
//! the debounce window, and the kinds seen in between are folded into one.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsEventKind {
    /// Path appeared.
    Created,
    /// Path content or metadata changed.
    Modified,
    /// Path disappeared.
    Removed,
}

impl FsEventKind {
    /// Fold a later event into an earlier one.
    ///
    /// `None` means the two cancel out (a file created and removed again
    /// inside one window never existed as far as clients are concerned).
    #[allow(clippy::match_same_arms)]
    fn then(self, later: Self) -> Option<Self> {
        use FsEventKind::{Created, Modified, Removed};

        match (self, later) {
            (Created, Removed) => None,
            (Created, _) => Some(Created),
            (Modified, later) => Some(later),
            (Removed, Created) => Some(Modified),
            (Removed, _) => Some(Removed),
        }
    }
}

/// A change that survived debouncing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DebouncedEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

struct Pending {
    kind: FsEventKind,
    quiet_at: Instant,
}

/// Thread-safe event debouncer.
///
/// `record` is called from the notify callback thread, `drain_ready` from the
/// forwarding task.
pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, Pending>>,
    window: Duration,
}

impl EventDebouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record a raw event, restarting the quiet period for its path.
    pub(crate) fn record(&self, path: PathBuf, kind: FsEventKind) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let quiet_at = Instant::now() + self.window;

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(Pending { kind, quiet_at });
            }
            Entry::Occupied(mut entry) => match entry.get().kind.then(kind) {
                Some(folded) => {
                    *entry.get_mut() = Pending {
                        kind: folded,
                        quiet_at,
                    };
                }
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Take every event whose quiet period has elapsed, ordered by path.
    pub(crate) fn drain_ready(&self) -> Vec<DebouncedEvent> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut ready = Vec::new();
        pending.retain(|path, event| {
            if event.quiet_at <= now {
                ready.push(DebouncedEvent {
                    path: path.clone(),
                    kind: event.kind,
                });
                false
            } else {
                true
            }
        });
        ready.sort_by(|a, b| a.path.cmp(&b.path));
        ready
    }

    /// Number of paths still waiting for their quiet period.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
