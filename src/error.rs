use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems. Any of these stops the run before a single
/// task is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Failures owned by a single watch producer. They end that producer only.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch {}: {source}", .path.display())]
    Acquire {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("watch facility reported an error: {0}")]
    Notify(#[from] notify::Error),
    #[error("watch stream for {} closed unexpectedly", .0.display())]
    StreamClosed(PathBuf),
    #[error("event channel has no readers left")]
    ChannelClosed,
}

/// Outcome of a write that did not reach the channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("write aborted by cancellation")]
    Cancelled,
    #[error("event channel closed")]
    Closed,
}
