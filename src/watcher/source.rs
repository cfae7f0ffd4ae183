use std::path::{Path, PathBuf};

use async_channel as chan;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace};

use crate::error::WatchError;

use super::event::{RawNotification, RenameSide};

/// Item delivered from the watch facility to its producer.
pub type RawItem = Result<RawNotification, WatchError>;

/// Handler handed to a [`WatchSource`], invoked once per raw notification.
///
/// Safe to call from any thread and from several threads at once. It never
/// blocks: items go into the owning producer's unbounded inbox, which keeps
/// them in delivery order.
#[derive(Debug, Clone)]
pub struct RawSink {
    tx: chan::Sender<RawItem>,
}

impl RawSink {
    pub(crate) fn new() -> (Self, chan::Receiver<RawItem>) {
        let (tx, rx) = chan::unbounded();
        (Self { tx }, rx)
    }

    /// Forward one notification. Returns `false` once the producer is gone.
    pub fn push(&self, item: RawItem) -> bool {
        self.tx.try_send(item).is_ok()
    }

    pub fn notify(&self, notification: RawNotification) -> bool {
        self.push(Ok(notification))
    }
}

/// OS-level directory watching facility.
///
/// `watch` starts a recursive watch on `path` and returns a handle that keeps
/// it alive. Dropping the handle releases the watch.
pub trait WatchSource: Send + Sync + 'static {
    type Handle: Send + 'static;

    fn watch(&self, path: &Path, sink: RawSink) -> Result<Self::Handle, WatchError>;
}

/// [`WatchSource`] backed by the platform's recommended `notify` watcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifySource;

/// Live `notify` watch. Released on drop.
#[derive(Debug)]
pub struct NotifyHandle {
    watcher: RecommendedWatcher,
    path: PathBuf,
}

impl Drop for NotifyHandle {
    fn drop(&mut self) {
        // Fails harmlessly when the watched directory is already gone.
        if let Err(e) = self.watcher.unwatch(&self.path) {
            debug!(path = %self.path.display(), error = %e, "unwatch failed");
        }
        trace!(path = %self.path.display(), "watch handle released");
    }
}

impl WatchSource for NotifySource {
    type Handle = NotifyHandle;

    fn watch(&self, path: &Path, sink: RawSink) -> Result<NotifyHandle, WatchError> {
        let acquire = |source| WatchError::Acquire {
            path: path.to_path_buf(),
            source,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for raw in classify(event) {
                        if !sink.notify(raw) {
                            return;
                        }
                    }
                }
                Err(e) => {
                    sink.push(Err(WatchError::Notify(e)));
                }
            },
            Config::default(),
        )
        .map_err(acquire)?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(acquire)?;

        Ok(NotifyHandle {
            watcher,
            path: path.to_path_buf(),
        })
    }
}

/// Translate a `notify` event into zero or more raw notifications.
///
/// Only name, content and timestamp changes are of interest; access events
/// are dropped. Renames reported in halves come out as
/// [`RawNotification::RenameHalf`] for the producer to pair. inotify sends a
/// tracked `Name(Both)` after its own tracked `From`/`To` halves, so only an
/// untracked `Both` is reported directly.
pub fn classify(event: Event) -> Vec<RawNotification> {
    let tracker = event.attrs.tracker();
    let Event { kind, mut paths, .. } = event;

    let halves = |side, paths: Vec<PathBuf>| -> Vec<RawNotification> {
        paths
            .into_iter()
            .map(|path| RawNotification::RenameHalf {
                side,
                path,
                tracker,
            })
            .collect()
    };

    match kind {
        EventKind::Create(_) => paths.into_iter().map(RawNotification::Created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(RawNotification::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if tracker.is_some() {
                trace!(?paths, ?tracker, "rename already reported in halves");
                return Vec::new();
            }
            if paths.len() < 2 {
                trace!(?paths, "rename without both paths, ignoring");
                return Vec::new();
            }
            let to = paths.swap_remove(1);
            let from = paths.swap_remove(0);
            vec![RawNotification::Renamed { from, to }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => halves(RenameSide::From, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => halves(RenameSide::To, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            halves(RenameSide::Unknown, paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Other)) => {
            paths.into_iter().map(RawNotification::Changed).collect()
        }
        EventKind::Modify(_) => paths.into_iter().map(RawNotification::Changed).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
