use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use crate::channel::{EventReader, ReadOutcome};
use crate::watcher::event::{ChangeEvent, ChangeKind};

/// What a consumer does with each event it takes off the channel.
///
/// Called concurrently from every worker in the pool.
pub trait EventProcessor: Send + Sync + 'static {
    fn process(&self, worker: usize, event: &ChangeEvent);
}

/// Writes one log line per consumed event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProcessor;

impl EventProcessor for LogProcessor {
    fn process(&self, worker: usize, event: &ChangeEvent) {
        match (event.kind(), event.old_path()) {
            (ChangeKind::Renamed, Some(old)) => info!(
                worker,
                folder = event.folder(),
                from = %old.display(),
                to = %event.path().display(),
                "consumed rename"
            ),
            (kind, _) => info!(
                worker,
                folder = event.folder(),
                %kind,
                path = %event.path().display(),
                "consumed change"
            ),
        }
    }
}

/// Why a consumer worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    Cancelled,
    /// Every writer is gone and the channel is drained.
    Exhausted,
}

/// One worker of the pool: waits for data, drains whatever is immediately
/// available, and goes back to waiting.
pub struct ConsumerWorker<P: EventProcessor> {
    id: usize,
    reader: EventReader,
    processor: Arc<P>,
    stop: CancellationToken,
}

impl<P: EventProcessor> ConsumerWorker<P> {
    pub fn new(id: usize, reader: EventReader, processor: Arc<P>, stop: CancellationToken) -> Self {
        Self {
            id,
            reader,
            processor,
            stop,
        }
    }

    pub async fn run(self) -> ConsumerExit {
        let mut processed = 0usize;

        let exit = loop {
            let first = match self.reader.wait_for_event(&self.stop).await {
                ReadOutcome::Event(event) => event,
                ReadOutcome::Completed => break ConsumerExit::Exhausted,
                ReadOutcome::Cancelled => break ConsumerExit::Cancelled,
            };
            self.processor.process(self.id, &first);
            processed += 1;

            while !self.stop.is_cancelled() {
                let Some(event) = self.reader.try_read() else {
                    break;
                };
                self.processor.process(self.id, &event);
                processed += 1;
            }
        };

        debug!(worker = self.id, processed, ?exit, "consumer stopped");
        exit
    }
}

/// Spawn `size` workers sharing `reader`. Each event goes to exactly one of them.
pub fn spawn_pool<P: EventProcessor>(
    size: usize,
    reader: &EventReader,
    processor: &Arc<P>,
    stop: &CancellationToken,
) -> Vec<JoinHandle<ConsumerExit>> {
    (0..size)
        .map(|id| {
            let worker = ConsumerWorker::new(id, reader.clone(), Arc::clone(processor), stop.clone());
            tokio::spawn(worker.run().instrument(info_span!("consumer", worker = id)))
        })
        .collect()
}
