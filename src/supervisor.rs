//! Pipeline lifecycle: spawn one producer per folder and a fixed consumer
//! pool, wait for the quit request, then cancel and join everything.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::channel::event_channel;
use crate::config::{DEFAULT_SHUTDOWN_TIMEOUT, default_consumer_count};
use crate::consumer::{ConsumerExit, EventProcessor, spawn_pool};
use crate::registry::FolderSpec;
use crate::watcher::source::WatchSource;
use crate::watcher::{ProducerExit, WatchProducer};

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub producers_spawned: usize,
    pub consumers_spawned: usize,
    /// Producers that ended on their own error.
    pub producers_failed: usize,
    /// Tasks that panicked.
    pub tasks_faulted: usize,
    /// Tasks still running at the shutdown deadline, aborted.
    pub timed_out: usize,
}

enum Joined<T> {
    Finished(T),
    Aborted,
    Faulted,
    TimedOut,
}

/// Owns the cancellation token and the event channel for one run.
pub struct Supervisor<S: WatchSource, P: EventProcessor> {
    source: Arc<S>,
    processor: Arc<P>,
    consumers: usize,
    shutdown_timeout: Duration,
    stop: CancellationToken,
}

impl<S: WatchSource, P: EventProcessor> Supervisor<S, P> {
    pub fn new(source: S, processor: P) -> Self {
        Self {
            source: Arc::new(source),
            processor: Arc::new(processor),
            consumers: default_consumer_count(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            stop: CancellationToken::new(),
        }
    }

    /// Use `stop` instead of a fresh token. A pre-cancelled token makes
    /// [`run`](Self::run) shut down as soon as the pipeline is up.
    pub fn with_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers.max(1);
        self
    }

    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Cancel the run. Safe to call any number of times.
    pub fn shutdown(&self) {
        if !self.stop.is_cancelled() {
            info!("shutdown requested");
        }
        self.stop.cancel();
    }

    /// Run the pipeline over `folders` until `quit` resolves or the token is
    /// cancelled, then join every task.
    pub async fn run<Q>(&self, folders: Vec<FolderSpec>, quit: Q) -> RunReport
    where
        Q: Future<Output = ()>,
    {
        let mut report = RunReport::default();
        let (writer, reader) = event_channel();

        let producers = folders
            .into_iter()
            .map(|folder| {
                let name = folder.name.clone();
                let span = info_span!("producer", folder = %name);
                let producer = WatchProducer::new(
                    folder,
                    Arc::clone(&self.source),
                    writer.clone(),
                    self.stop.clone(),
                );
                (name, tokio::spawn(producer.run().instrument(span)))
            })
            .collect::<Vec<_>>();
        report.producers_spawned = producers.len();

        let consumers = spawn_pool(self.consumers, &reader, &self.processor, &self.stop);
        report.consumers_spawned = consumers.len();
        drop(reader);

        info!(
            producers = report.producers_spawned,
            consumers = report.consumers_spawned,
            "pipeline started"
        );

        tokio::select! {
            biased;
            () = self.stop.cancelled() => debug!("token cancelled externally"),
            () = quit => {}
        }

        self.shutdown();
        // Kept until now so that idle consumers wait for quit instead of
        // completing when no producer is running.
        drop(writer);

        let deadline = Instant::now() + self.shutdown_timeout;

        for (name, handle) in producers {
            match join_bounded(handle, deadline).await {
                Joined::Finished(ProducerExit::Cancelled) | Joined::Aborted => {}
                Joined::Finished(ProducerExit::Failed) => report.producers_failed += 1,
                Joined::Faulted => {
                    error!(folder = %name, "producer task panicked");
                    report.tasks_faulted += 1;
                }
                Joined::TimedOut => {
                    warn!(folder = %name, "producer did not stop in time, aborted");
                    report.timed_out += 1;
                }
            }
        }

        for (id, handle) in consumers.into_iter().enumerate() {
            match join_bounded(handle, deadline).await {
                Joined::Finished(ConsumerExit::Cancelled | ConsumerExit::Exhausted)
                | Joined::Aborted => {}
                Joined::Faulted => {
                    error!(worker = id, "consumer task panicked");
                    report.tasks_faulted += 1;
                }
                Joined::TimedOut => {
                    warn!(worker = id, "consumer did not stop in time, aborted");
                    report.timed_out += 1;
                }
            }
        }

        info!(
            producers_failed = report.producers_failed,
            tasks_faulted = report.tasks_faulted,
            timed_out = report.timed_out,
            "pipeline stopped"
        );

        report
    }
}

async fn join_bounded<T>(handle: JoinHandle<T>, deadline: Instant) -> Joined<T> {
    let abort_handle = handle.abort_handle();

    match timeout_at(deadline, handle).await {
        Ok(Ok(value)) => Joined::Finished(value),
        Ok(Err(e)) if e.is_cancelled() => Joined::Aborted,
        Ok(Err(e)) => {
            error!(error = %e, "task failed while joining");
            Joined::Faulted
        }
        Err(_) => {
            abort_handle.abort();
            Joined::TimedOut
        }
    }
}
