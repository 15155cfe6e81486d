//! Filesystem watch binding.
//!
//! Subscribes to `notify` events under one directory, debounces them per path
//! and reports each surviving change together with the file's current and
//! previous metadata. The previous metadata comes from a snapshot taken by an
//! initial scan; when that scan finishes a single [`WatchEvent::ScanComplete`]
//! is emitted before any change.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::task::JoinHandle;

use super::debouncer::{EventDebouncer, FsEventKind};
use crate::error::ServerError;
use crate::options::Filter;

/// How often the debouncer is polled for settled events.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Metadata snapshot of a watched path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub len: u64,
    /// Last modification time, where the platform reports one.
    pub modified: Option<SystemTime>,
    /// Whether the path is a directory.
    pub is_dir: bool,
}

impl From<&Metadata> for FileStat {
    fn from(metadata: &Metadata) -> Self {
        Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
            is_dir: metadata.is_dir(),
        }
    }
}

/// A single debounced change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FsEventKind,
    /// Metadata now; `None` once removed.
    pub current: Option<FileStat>,
    /// Metadata before the change; `None` for a new path.
    pub previous: Option<FileStat>,
}

/// Event reported by a [`WatchBinding`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// The initial scan finished. Carries every path found.
    ScanComplete { files: HashMap<PathBuf, FileStat> },
    /// A path changed.
    Changed(FileChange),
}

/// Active subscription to a directory tree.
///
/// Dropping the binding stops watching.
pub(crate) struct WatchBinding {
    directory: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchBinding {
    /// Watch `directory` recursively, reporting paths accepted by `filter`.
    /// With `ignore_dot_files`, paths with a dot-prefixed component below
    /// `directory` are skipped as well.
    ///
    /// Must be called inside a tokio runtime.
    pub(crate) fn bind<F>(
        directory: &Path,
        filter: Filter,
        ignore_dot_files: bool,
        debounce: Duration,
        mut on_event: F,
    ) -> Result<Self, ServerError>
    where
        F: FnMut(WatchEvent) + Send + 'static,
    {
        let watch_error = |source: notify::Error| ServerError::Watch {
            path: directory.to_path_buf(),
            source,
        };
        let directory = std::fs::canonicalize(directory)
            .map_err(|e| watch_error(notify::Error::io(e)))?;

        let filter = PathFilter {
            root: directory.clone(),
            filter,
            ignore_dot_files,
        };
        let debouncer = Arc::new(EventDebouncer::new(debounce));
        let debouncer_for_record = Arc::clone(&debouncer);
        let filter_for_record = filter.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            record_notify_events(res, &debouncer_for_record, &filter_for_record);
        })
        .map_err(watch_error)?;
        watcher
            .watch(&directory, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        let root = directory.clone();
        let task = tokio::spawn(async move {
            let mut snapshot = tokio::task::spawn_blocking(move || scan(&filter))
                .await
                .unwrap_or_default();
            tracing::debug!(directory = %root.display(), files = snapshot.len(), "Initial scan complete");
            on_event(WatchEvent::ScanComplete {
                files: snapshot.clone(),
            });

            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;

                for event in debouncer.drain_ready() {
                    let current = tokio::fs::symlink_metadata(&event.path)
                        .await
                        .ok()
                        .map(|metadata| FileStat::from(&metadata));
                    let previous = match current {
                        Some(stat) => snapshot.insert(event.path.clone(), stat),
                        None => snapshot.remove(&event.path),
                    };

                    // Trust the filesystem over the folded event kind.
                    let kind = match (&previous, &current) {
                        (None, None) => continue,
                        (None, Some(_)) => FsEventKind::Created,
                        (Some(_), Some(_)) => FsEventKind::Modified,
                        (Some(_), None) => FsEventKind::Removed,
                    };
                    if kind != event.kind {
                        tracing::trace!(path = %event.path.display(), folded = ?event.kind, ?kind, "Event kind corrected");
                    }

                    on_event(WatchEvent::Changed(FileChange {
                        path: event.path,
                        kind,
                        current,
                        previous,
                    }));
                }
            }
        });

        tracing::info!(directory = %directory.display(), "Watching for changes");
        Ok(Self {
            directory,
            _watcher: watcher,
            task,
        })
    }

    /// Stop watching.
    pub(crate) fn unbind(self) {
        tracing::debug!(directory = %self.directory.display(), "Stopped watching");
    }
}

impl Drop for WatchBinding {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Caller filter plus the dot-file rule, relative to the watched directory.
#[derive(Clone)]
struct PathFilter {
    root: PathBuf,
    filter: Filter,
    ignore_dot_files: bool,
}

impl PathFilter {
    fn accepts(&self, path: &Path) -> bool {
        if self.ignore_dot_files && self.is_dot_path(path) {
            return false;
        }
        (self.filter)(path)
    }

    fn is_dot_path(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .any(|component| match component {
                Component::Normal(name) => name.to_string_lossy().starts_with('.'),
                _ => false,
            })
    }
}

fn fs_event_kind(kind: notify::EventKind) -> Option<FsEventKind> {
    match kind {
        notify::EventKind::Create(_) => Some(FsEventKind::Created),
        notify::EventKind::Modify(_) => Some(FsEventKind::Modified),
        notify::EventKind::Remove(_) => Some(FsEventKind::Removed),
        _ => None,
    }
}

/// Record the filtered paths of a notify event into the debouncer.
fn record_notify_events(
    res: Result<notify::Event, notify::Error>,
    debouncer: &EventDebouncer,
    filter: &PathFilter,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Watch error");
            return;
        }
    };
    let Some(kind) = fs_event_kind(event.kind) else {
        return;
    };
    for path in event.paths {
        if filter.accepts(&path) {
            tracing::trace!(path = %path.display(), ?kind, "Recorded filesystem event");
            debouncer.record(path, kind);
        }
    }
}

/// Snapshot every path under the filter's root that it accepts.
fn scan(filter: &PathFilter) -> HashMap<PathBuf, FileStat> {
    let walk_filter = filter.clone();
    ignore::WalkBuilder::new(&filter.root)
        .standard_filters(false)
        .filter_entry(move |entry| entry.depth() == 0 || walk_filter.accepts(entry.path()))
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.depth() > 0)
        .filter_map(|entry| {
            let stat = FileStat::from(&entry.metadata().ok()?);
            Some((entry.into_path(), stat))
        })
        .collect()
}
