//! Read-only aggregates over the Store, for CLI and dashboard (component G,
//! §4.6). Never mutates; tolerates concurrent claim/finalize traffic because
//! every read is a Store snapshot read, never a long-lived lock.

use crate::error::ManagerError;
use crate::model::{Job, JobState};
use crate::store::{Aggregate, JobStore, ListFilter};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Aggregate counts per state plus the count of active workers in this
/// process (§4.2's `Status()`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub aggregate: Aggregate,
    pub active_workers: usize,
}

/// Totals per state and mean completed runtime (§4.2's `Metrics()`). The
/// same shape as `Aggregate` — kept as a distinct type since the CLI/
/// dashboard contracts for `status` and `metrics` are independent surfaces
/// that happen to share a data source today.
pub type MetricsSnapshot = Aggregate;

/// The exit code, stdout, and stderr of the most recent attempt (§4.2's
/// `Logs(id)`).
#[derive(Debug, Clone, Serialize)]
pub struct JobLogs {
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
}

/// A process-local counter of currently-running workers, incremented and
/// decremented by the Pool Supervisor (§4.5). Not authoritative across
/// multiple concurrent `worker start` invocations against the same Store.
#[derive(Debug, Clone, Default)]
pub struct ActiveWorkerCounter(Arc<AtomicUsize>);

impl ActiveWorkerCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pure read path over a [`JobStore`] (component G).
pub struct StatusReader {
    store: Arc<dyn JobStore>,
    active_workers: ActiveWorkerCounter,
}

impl StatusReader {
    pub fn new(store: Arc<dyn JobStore>, active_workers: ActiveWorkerCounter) -> Self {
        Self {
            store,
            active_workers,
        }
    }

    pub async fn status(&self) -> Result<StatusSnapshot, ManagerError> {
        Ok(StatusSnapshot {
            aggregate: self.store.aggregate().await?,
            active_workers: self.active_workers.get(),
        })
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot, ManagerError> {
        Ok(self.store.aggregate().await?)
    }

    pub async fn list(&self, state: Option<JobState>, limit: i64) -> Result<Vec<Job>, ManagerError> {
        let filter = match state {
            Some(s) => ListFilter::State(s),
            None => ListFilter::Any,
        };
        Ok(self.store.list(filter, limit).await?)
    }

    pub async fn logs(&self, id: &str) -> Result<JobLogs, ManagerError> {
        let job = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| crate::error::StoreError::NotFound(id.to_string()))?;
        Ok(JobLogs {
            exit_code: job.exit_code,
            stdout: job.stdout,
            stderr: job.stderr,
        })
    }

    pub async fn dlq_list(&self, limit: i64) -> Result<Vec<Job>, ManagerError> {
        self.list(Some(JobState::Dead), limit).await
    }
}
