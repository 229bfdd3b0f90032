//! Semantic operations over the Store (component B, §4.2).
//!
//! Validates inputs, assigns timestamps, and fills defaults from the current
//! Config. Mirrors the teacher's thin-wrapper-over-a-trait-object shape
//! (`Dispatcher` wrapping a `JobQueue: Arc<dyn JobQueue>`).

use crate::clock::Clock;
use crate::config::ConfigKey;
use crate::error::ManagerError;
use crate::model::Job;
use crate::store::{JobStore, NewJob};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// The enqueue payload (§6.2). Unknown keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnqueueSpec {
    pub id: String,
    pub command: String,
    pub priority: Option<i64>,
    #[serde(rename = "timeout")]
    pub timeout_s: Option<i64>,
    pub max_retries: Option<i64>,
    pub run_at: Option<String>,
}

/// Thin semantic layer over any [`JobStore`] implementation.
pub struct JobManager {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validates required fields, fills defaults from Config, and inserts
    /// the job in state `pending` with `next_attempt_at = run_at`.
    pub async fn enqueue(&self, spec: EnqueueSpec) -> Result<Job, ManagerError> {
        if spec.id.trim().is_empty() {
            return Err(ManagerError::MissingField("id"));
        }
        if spec.command.trim().is_empty() {
            return Err(ManagerError::MissingField("command"));
        }

        let run_at = parse_run_at(spec.run_at.as_deref(), self.clock.now())?;
        let config = self.store.get_config().await?;
        let now = self.clock.now();

        let new_job = NewJob {
            id: spec.id,
            command: spec.command,
            priority: spec.priority.unwrap_or(config.default_priority),
            timeout_s: spec.timeout_s.unwrap_or(config.default_timeout),
            max_retries: spec.max_retries.unwrap_or(config.max_retries),
            run_at,
            created_at: now,
        };

        Ok(self.store.insert(new_job).await?)
    }

    /// `dead -> pending`, resetting attempts; errors if `id` is not `dead`.
    pub async fn dlq_retry(&self, id: &str) -> Result<(), ManagerError> {
        self.store.retry_from_dlq(id).await?;
        Ok(())
    }

    pub async fn config_get(&self) -> Result<crate::config::Config, ManagerError> {
        Ok(self.store.get_config().await?)
    }

    pub async fn config_set(&self, key: ConfigKey, value: i64) -> Result<(), ManagerError> {
        key.validate(value)
            .map_err(|reason| crate::error::StoreError::InvalidConfigValue {
                key: key.to_string(),
                reason,
            })?;
        self.store.set_config(key, value).await?;
        Ok(())
    }
}

/// `"now"` or an absent value means immediate eligibility; otherwise parses
/// a strict ISO-8601 UTC timestamp (§6.2, §9's run_at open question).
fn parse_run_at(raw: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ManagerError> {
    match raw {
        None => Ok(now),
        Some(s) if s.eq_ignore_ascii_case("now") => Ok(now),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ManagerError::InvalidRunAt(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_at_defaults_to_now() {
        let now = Utc::now();
        assert_eq!(parse_run_at(None, now).unwrap(), now);
        assert_eq!(parse_run_at(Some("now"), now).unwrap(), now);
        assert_eq!(parse_run_at(Some("NOW"), now).unwrap(), now);
    }

    #[test]
    fn parse_run_at_rejects_malformed_timestamps() {
        let now = Utc::now();
        assert!(parse_run_at(Some("not-a-date"), now).is_err());
    }

    #[test]
    fn parse_run_at_accepts_rfc3339() {
        let now = Utc::now();
        let parsed = parse_run_at(Some("2026-01-01T00:00:00Z"), now).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }
}
