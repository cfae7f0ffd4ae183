pub mod event;
pub mod rename;
pub mod source;

use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::channel::EventWriter;
use crate::error::{WatchError, WriteError};
use crate::registry::FolderSpec;

use event::{ChangeEvent, ChangeKind, RawNotification};
use rename::{RENAME_WINDOW, RenameTracker};
use source::{RawSink, WatchSource};

/// How a producer task ended. Neither variant is propagated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// Stopped by the cancellation token.
    Cancelled,
    /// Setup or watching failed; the error has already been logged.
    Failed,
}

/// Watches one folder and feeds its changes into the event channel.
///
/// Lifecycle: acquire the watch handle, forward notifications until the token
/// is cancelled, then release the handle. Rename halves are paired here, so a
/// half still waiting for its partner at cancellation is dropped. Any failure is logged with the
/// folder path and ends this producer only.
pub struct WatchProducer<S: WatchSource> {
    folder: FolderSpec,
    folder_name: Arc<str>,
    source: Arc<S>,
    writer: EventWriter,
    stop: CancellationToken,
}

impl<S: WatchSource> WatchProducer<S> {
    pub fn new(
        folder: FolderSpec,
        source: Arc<S>,
        writer: EventWriter,
        stop: CancellationToken,
    ) -> Self {
        let folder_name = Arc::from(folder.name.as_str());
        Self {
            folder,
            folder_name,
            source,
            writer,
            stop,
        }
    }

    pub async fn run(self) -> ProducerExit {
        match self.watch().await {
            Ok(()) => {
                info!(
                    folder = %self.folder.name,
                    path = %self.folder.path.display(),
                    "watch cancelled, producer stopped"
                );
                ProducerExit::Cancelled
            }
            Err(e) => {
                error!(
                    folder = %self.folder.name,
                    path = %self.folder.path.display(),
                    error = %e,
                    "watch producer failed"
                );
                ProducerExit::Failed
            }
        }
    }

    async fn watch(&self) -> Result<(), WatchError> {
        let (sink, inbox) = RawSink::new();

        // Held for the whole loop; every return path below drops it.
        let _handle = self.source.watch(&self.folder.path, sink)?;

        info!(
            folder = %self.folder.name,
            path = %self.folder.path.display(),
            "watching folder"
        );

        let mut renames = RenameTracker::default();
        let mut tick = interval_at(Instant::now() + RENAME_WINDOW, RENAME_WINDOW);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let ready = tokio::select! {
                biased;
                () = self.stop.cancelled() => return Ok(()),
                item = inbox.recv() => match item {
                    Ok(Ok(raw)) => renames.feed(raw, Instant::now()),
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Err(WatchError::StreamClosed(self.folder.path.clone())),
                },
                now = tick.tick() => renames.expire(now),
            };

            for raw in ready {
                if !self.forward(raw).await? {
                    return Ok(());
                }
            }
        }
    }

    /// Write one notification to the channel. `Ok(false)` means the write
    /// was abandoned because the token was cancelled.
    async fn forward(&self, raw: RawNotification) -> Result<bool, WatchError> {
        let event = ChangeEvent::from_raw(&self.folder_name, raw);
        log_received(&event);

        match self.writer.write(event, &self.stop).await {
            Ok(()) => Ok(true),
            Err(WriteError::Cancelled) => {
                debug!(folder = %self.folder.name, "write aborted by cancellation");
                Ok(false)
            }
            Err(WriteError::Closed) => Err(WatchError::ChannelClosed),
        }
    }
}

fn log_received(event: &ChangeEvent) {
    match (event.kind(), event.old_path()) {
        (ChangeKind::Renamed, Some(old)) => info!(
            folder = event.folder(),
            from = %old.display(),
            to = %event.path().display(),
            "received rename"
        ),
        (kind, _) => info!(
            folder = event.folder(),
            %kind,
            path = %event.path().display(),
            "received change"
        ),
    }
}
