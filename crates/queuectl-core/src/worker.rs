//! The finalize policy that turns an Executor outcome into a durable state
//! transition (component D, §4.4).

use crate::clock::Clock;
use crate::executor::{Executor, Outcome};
use crate::store::{AttemptResult, JobStore};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Poll interval bounds when the queue is empty (§4.4 step 1), jittered.
const POLL_MIN_MS: u64 = 200;
const POLL_MAX_MS: u64 = 500;

/// Informational per-job log file sink (§6.3). The Store row is always
/// authoritative; a `LogSink` is a best-effort side channel a collaborator
/// (the CLI) can plug in. Failures are logged and otherwise ignored — they
/// must never affect the job's durable state transition.
pub trait LogSink: Send + Sync {
    fn write(&self, job_id: &str, stdout: &str, stderr: &str, error: Option<&str>);
}

/// The default sink: writes nothing. Used when no collaborator registers one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn write(&self, _job_id: &str, _stdout: &str, _stderr: &str, _error: Option<&str>) {}
}

/// One worker's claim -> execute -> finalize loop.
pub struct Worker {
    id: String,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
    log_sink: Arc<dyn LogSink>,
}

impl Worker {
    pub fn new(
        id: String,
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self::with_log_sink(id, store, clock, shutdown, Arc::new(NoopLogSink))
    }

    pub fn with_log_sink(
        id: String,
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Receiver<bool>,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            id,
            store,
            clock,
            shutdown,
            log_sink,
        }
    }

    /// Runs until the shutdown signal fires. Never leaves a row in
    /// `processing` voluntarily: a job claimed this iteration is always
    /// finalized before the loop checks shutdown again.
    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                info!(worker = %self.id, "shutting down");
                return;
            }

            let now = self.clock.now();
            match self.store.claim_next(&self.id, now).await {
                Ok(Some(job)) => {
                    debug!(worker = %self.id, job = %job.id, "claimed job");
                    self.execute_and_finalize(job).await;
                }
                Ok(None) => {
                    self.sleep_poll_interval().await;
                }
                Err(e) => {
                    warn!(worker = %self.id, error = %e, "claim_next failed, backing off");
                    self.sleep_poll_interval().await;
                }
            }
        }
    }

    async fn execute_and_finalize(&self, job: crate::model::Job) {
        let outcome = Executor::run(&job.command, job.timeout_s).await;
        let now = self.clock.now();
        let result = AttemptResult {
            exit_code: outcome.exit_code.map(i64::from),
            stdout: outcome.stdout.clone(),
            stderr: outcome.stderr.clone(),
            finished_at: now,
        };

        if outcome.is_success() {
            self.log_sink.write(&job.id, &result.stdout, &result.stderr, None);
            if let Err(e) = self.store.finalize_completed(&job.id, result).await {
                warn!(worker = %self.id, job = %job.id, error = %e, "failed to finalize completed job");
            }
            return;
        }

        let error = outcome.failure_reason();
        self.log_sink.write(&job.id, &result.stdout, &result.stderr, Some(&error));
        self.finalize_failure(&job, &outcome, &error, result, now).await;
    }

    async fn finalize_failure(
        &self,
        job: &crate::model::Job,
        _outcome: &Outcome,
        error: &str,
        result: AttemptResult,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        // attempts was already incremented by claim_next (§4.4's "post-increment
        // attempt count"); retries remain iff that count is still within budget.
        if job.attempts <= job.max_retries {
            let config = match self.store.get_config().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(worker = %self.id, job = %job.id, error = %e, "failed to read config for backoff");
                    return;
                }
            };
            let delay = backoff_delay_seconds(config.backoff_base, job.attempts);
            let next_attempt_at = now + ChronoDuration::seconds(delay);
            if let Err(e) = self
                .store
                .reschedule_retry(&job.id, next_attempt_at, error, result)
                .await
            {
                warn!(worker = %self.id, job = %job.id, error = %e, "failed to reschedule retry");
            }
        } else if let Err(e) = self.store.move_to_dead(&job.id, error, result).await {
            warn!(worker = %self.id, job = %job.id, error = %e, "failed to move job to dead letter queue");
        }
    }

    async fn sleep_poll_interval(&mut self) {
        let jitter_ms = POLL_MIN_MS + fastrand::u64(0..(POLL_MAX_MS - POLL_MIN_MS));
        let sleep = tokio::time::sleep(std::time::Duration::from_millis(jitter_ms));
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => {}
            _ = self.shutdown.changed() => {}
        }
    }
}

/// `delay_seconds = backoff_base ^ attempts` (§4.4's backoff formula, using
/// the post-increment attempt count already stored on the row).
pub fn backoff_delay_seconds(backoff_base: i64, attempts: i64) -> i64 {
    backoff_base.saturating_pow(attempts.max(0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_matches_spec_example() {
        // base=2: attempts 1,2,3 -> delays 2s, 4s, 8s.
        assert_eq!(backoff_delay_seconds(2, 1), 2);
        assert_eq!(backoff_delay_seconds(2, 2), 4);
        assert_eq!(backoff_delay_seconds(2, 3), 8);
    }

    #[test]
    fn backoff_with_custom_base() {
        assert_eq!(backoff_delay_seconds(3, 2), 9);
    }
}
