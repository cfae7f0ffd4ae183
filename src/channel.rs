//! Unbounded multi-producer/multi-consumer queue connecting watch producers to
//! the consumer pool.
//!
//! Writers and readers are cheap clones of the same channel and need no
//! external locking. Each event is delivered to exactly one reader. The
//! channel completes once every [`EventWriter`] has been dropped; readers
//! drain what is left and then observe [`ReadOutcome::Completed`].

use async_channel as chan;
use tokio_util::sync::CancellationToken;

use crate::error::WriteError;
use crate::watcher::event::ChangeEvent;

/// Result of a suspending read.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Event(ChangeEvent),
    /// All writers are gone and the queue is empty.
    Completed,
    Cancelled,
}

/// Writing half. Clone one per producer.
#[derive(Debug, Clone)]
pub struct EventWriter {
    tx: chan::Sender<ChangeEvent>,
}

/// Reading half. Clone one per consumer.
#[derive(Debug, Clone)]
pub struct EventReader {
    rx: chan::Receiver<ChangeEvent>,
}

/// Create an unbounded event channel.
///
/// Capacity is unbounded: a stalled consumer pool lets the queue grow rather
/// than slowing producers down.
pub fn event_channel() -> (EventWriter, EventReader) {
    let (tx, rx) = chan::unbounded();
    (EventWriter { tx }, EventReader { rx })
}

impl EventWriter {
    /// Append `event` to the channel.
    ///
    /// Aborts with [`WriteError::Cancelled`] if `stop` is (or becomes)
    /// cancelled before the event is queued.
    pub async fn write(
        &self,
        event: ChangeEvent,
        stop: &CancellationToken,
    ) -> Result<(), WriteError> {
        if stop.is_cancelled() {
            return Err(WriteError::Cancelled);
        }

        tokio::select! {
            biased;
            () = stop.cancelled() => Err(WriteError::Cancelled),
            res = self.tx.send(event) => res.map_err(|_| WriteError::Closed),
        }
    }
}

impl EventReader {
    /// Suspend until an event is available, the channel completes, or `stop`
    /// is cancelled.
    pub async fn wait_for_event(&self, stop: &CancellationToken) -> ReadOutcome {
        tokio::select! {
            biased;
            () = stop.cancelled() => ReadOutcome::Cancelled,
            res = self.rx.recv() => match res {
                Ok(event) => ReadOutcome::Event(event),
                Err(chan::RecvError) => ReadOutcome::Completed,
            },
        }
    }

    /// Non-blocking read. `None` when nothing is immediately available.
    pub fn try_read(&self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// `true` once every writer is gone. Queued events can still be read.
    pub fn is_completed(&self) -> bool {
        self.rx.is_closed()
    }
}
