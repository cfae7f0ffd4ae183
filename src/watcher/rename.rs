//! Pairs the two halves of a rename reported as separate events.
//!
//! Windows reports a rename as `From` followed by `To`, inotify does the same
//! with a shared cookie, and macOS sends one undirected event per side. A
//! half left unpaired for longer than the window is a move across the folder
//! boundary: a lone `To` is reported as created straight away, a lone `From`
//! as deleted once it expires.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::event::{RawNotification, RenameSide};

/// How long a half waits for its partner.
pub const RENAME_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct Pending {
    path: PathBuf,
    tracker: Option<usize>,
    at: Instant,
}

/// Per-producer rename matching state.
#[derive(Debug)]
pub struct RenameTracker {
    window: Duration,
    from: VecDeque<Pending>,
    unknown: Option<Pending>,
}

impl Default for RenameTracker {
    fn default() -> Self {
        Self::new(RENAME_WINDOW)
    }
}

impl RenameTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            from: VecDeque::new(),
            unknown: None,
        }
    }

    /// Feed one notification received at `now`. Returns what is ready to be
    /// written; halves waiting for a partner are held back.
    pub fn feed(&mut self, raw: RawNotification, now: Instant) -> Vec<RawNotification> {
        let RawNotification::RenameHalf {
            side,
            path,
            tracker,
        } = raw
        else {
            return vec![raw];
        };

        match side {
            RenameSide::From => {
                self.from.push_back(Pending { path, tracker, at: now });
                Vec::new()
            }
            RenameSide::To => match self.take_from(tracker) {
                Some(from) => vec![RawNotification::Renamed { from, to: path }],
                None => {
                    trace!(path = %path.display(), "rename target without source, moved in");
                    vec![RawNotification::Created(path)]
                }
            },
            // The first of two undirected halves is the old name.
            RenameSide::Unknown => match self.unknown.take() {
                Some(first) => vec![RawNotification::Renamed {
                    from: first.path,
                    to: path,
                }],
                None => {
                    self.unknown = Some(Pending { path, tracker, at: now });
                    Vec::new()
                }
            },
        }
    }

    /// Resolve every half older than the window as of `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<RawNotification> {
        let window = self.window;
        let mut out = Vec::new();

        while let Some(front) = self.from.front() {
            if now.duration_since(front.at) < window {
                break;
            }
            if let Some(stale) = self.from.pop_front() {
                trace!(path = %stale.path.display(), "rename source without target, moved out");
                out.push(RawNotification::Deleted(stale.path));
            }
        }

        if let Some(pending) = self.unknown.take_if(|p| now.duration_since(p.at) >= window) {
            // A lone undirected half means the other side is outside the
            // folder; whether the path still exists tells which way it went.
            out.push(if pending.path.exists() {
                RawNotification::Created(pending.path)
            } else {
                RawNotification::Deleted(pending.path)
            });
        }

        out
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.unknown.is_none()
    }

    /// A tracked target only matches its own source; an untracked one takes
    /// the oldest untracked source.
    fn take_from(&mut self, tracker: Option<usize>) -> Option<PathBuf> {
        let idx = self.from.iter().position(|p| p.tracker == tracker)?;
        self.from.remove(idx).map(|p| p.path)
    }
}
