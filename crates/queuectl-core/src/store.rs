//! The `JobStore` trait: the single source of truth contract (component A).
//!
//! Grounded on the teacher's `seesaw::job::JobStore` trait shape (`ClaimedJob`,
//! `FailureKind`) and its `PgJobStore` claim-and-finalize method split —
//! generalized here to the full state machine §4.1 specifies, and to a
//! backend-agnostic trait so `queuectl-sqlite` can implement it without the
//! core crate depending on any particular database driver.

use crate::config::{Config, ConfigKey};
use crate::error::StoreError;
use crate::model::{Job, JobState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fields required to insert a new job row; defaults have already been
/// filled in by the Job Manager (§4.2) from the current Config.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub command: String,
    pub priority: i64,
    pub timeout_s: i64,
    pub max_retries: i64,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Which jobs `List` should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    Any,
    State(JobState),
}

/// Per-state counts plus mean completed runtime, as returned by `Aggregate`
/// and surfaced through `Status`/`Metrics` (§4.2, §4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead: i64,
    /// Mean `finished_at - started_at` over `completed` jobs, in seconds.
    pub avg_completed_runtime_s: Option<f64>,
}

/// The terminal fields written by a finished attempt, common to the
/// completed, failed, and dead transitions.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
    pub finished_at: DateTime<Utc>,
}

/// Durable, transactional record of jobs, their state, and configuration;
/// provides the atomic-claim primitive (§4.1).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create schema if absent; upgrade idempotently. Also runs the orphan
    /// sweep described in §4.1's Failure semantics.
    async fn init(&self) -> Result<(), StoreError>;

    /// Atomic insert; fails with `DuplicateId` if `id` exists (invariant 1).
    async fn insert(&self, job: NewJob) -> Result<Job, StoreError>;

    /// Snapshot read by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// By `state`, newest first by `created_at`.
    async fn list(&self, filter: ListFilter, limit: i64) -> Result<Vec<Job>, StoreError>;

    /// Counts per state; avg runtime over `completed` jobs.
    async fn aggregate(&self) -> Result<Aggregate, StoreError>;

    /// Typed, range-validated config write.
    async fn set_config(&self, key: ConfigKey, value: i64) -> Result<(), StoreError>;

    /// The current config snapshot.
    async fn get_config(&self) -> Result<Config, StoreError>;

    /// The critical section (§4.1): atomically claims the highest-priority,
    /// earliest-created ready job for `worker_id`, or returns `None` if no
    /// job is ready or another worker won the race.
    async fn claim_next(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>, StoreError>;

    /// `processing -> completed`.
    async fn finalize_completed(&self, id: &str, result: AttemptResult) -> Result<(), StoreError>;

    /// `processing -> failed`, with the next retry scheduled.
    async fn reschedule_retry(
        &self,
        id: &str,
        next_attempt_at: DateTime<Utc>,
        error: &str,
        result: AttemptResult,
    ) -> Result<(), StoreError>;

    /// `processing -> dead`.
    async fn move_to_dead(&self, id: &str, error: &str, result: AttemptResult) -> Result<(), StoreError>;

    /// `dead -> pending`, resets attempts to 0 (invariant 6). Errors with
    /// `NotDead` if `id` is not currently `dead`.
    async fn retry_from_dlq(&self, id: &str) -> Result<(), StoreError>;

    /// Resets rows stuck in `processing` whose `started_at` predates
    /// `timeout_s + grace_s` back to `failed` with `error = "orphaned"`
    /// (§4.1's crash-recovery sweep). Returns the number of rows repaired.
    async fn reap_orphans(&self, now: DateTime<Utc>, grace_s: i64) -> Result<u64, StoreError>;
}
