//! Watch a set of directory trees and stream normalized change events from
//! one producer per folder, through a shared unbounded channel, to a fixed
//! pool of consumers.

pub mod channel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod quit;
pub mod registry;
pub mod supervisor;
pub mod watcher;

pub use channel::{EventReader, EventWriter, ReadOutcome, event_channel};
pub use config::{FolderEntry, WatchConfig};
pub use consumer::{EventProcessor, LogProcessor};
pub use error::{ConfigError, WatchError, WriteError};
pub use registry::{FolderSpec, register};
pub use supervisor::{RunReport, Supervisor};
pub use watcher::event::{ChangeEvent, ChangeKind, RawNotification, RenameSide};
pub use watcher::rename::RenameTracker;
pub use watcher::source::{NotifySource, RawSink, WatchSource};
