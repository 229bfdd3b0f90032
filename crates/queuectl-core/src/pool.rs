//! Spawns N workers, propagates shutdown, waits for graceful exit (component
//! E, §4.5).

use crate::clock::Clock;
use crate::status::ActiveWorkerCounter;
use crate::store::JobStore;
use crate::worker::{LogSink, NoopLogSink, Worker};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Owns the lifetimes of `N` [`Worker`]s and the single broadcast
/// cancellation channel that stops them.
pub struct PoolSupervisor {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    active_workers: ActiveWorkerCounter,
}

impl PoolSupervisor {
    /// Spawns `count` workers with identities `worker-1..worker-count`.
    pub fn spawn(
        count: usize,
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        active_workers: ActiveWorkerCounter,
    ) -> Self {
        Self::spawn_with_log_sink(count, store, clock, active_workers, Arc::new(NoopLogSink))
    }

    /// As [`Self::spawn`], but with a [`LogSink`] collaborator each worker
    /// reports its last attempt's output to (§6.3). Informational only.
    pub fn spawn_with_log_sink(
        count: usize,
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        active_workers: ActiveWorkerCounter,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(count);

        for n in 1..=count {
            let id = format!("worker-{n}");
            let worker = Worker::with_log_sink(id, store.clone(), clock.clone(), shutdown_rx.clone(), log_sink.clone());
            let counter = active_workers.clone();
            counter.increment();
            handles.push(tokio::spawn(async move {
                worker.run().await;
                counter.decrement();
            }));
        }

        Self {
            shutdown_tx,
            handles,
            active_workers,
        }
    }

    /// Broadcasts cancellation to all workers and waits for graceful exit.
    /// A worker never leaves a row in `processing` voluntarily (§4.4); once
    /// this returns, every worker has finalized its in-flight job, if any.
    pub async fn shutdown(self) {
        info!(count = self.handles.len(), "signaling worker shutdown");
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }

    pub fn active_worker_count(&self) -> usize {
        self.active_workers.get()
    }
}
