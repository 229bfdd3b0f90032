//! SQLite implementation of the QueueCTL job store.
//!
//! This crate provides the concrete, transactional implementation of the
//! `JobStore` trait from `queuectl-core`, backed by a single on-disk SQLite
//! database file with WAL journaling.
//!
//! # Features
//!
//! - Atomic claim via a `WITH candidate AS (...) UPDATE ... RETURNING`
//!   statement, guarded by `WHERE state IN ('pending','failed')` to defeat
//!   the two-workers-see-the-same-row race.
//! - A single-connection pool (`max_connections(1)`) makes every statement
//!   against this handle strictly serialized in-process; `busy_timeout`
//!   plus an application-level bounded retry absorb contention from a
//!   second worker-pool process sharing the same database file.
//! - Exponential backoff retry scheduling, dead-letter transitions, and a
//!   startup/on-demand orphan sweep for jobs abandoned by a crashed worker.
//!
//! # Schema
//!
//! Applied by versioned migrations under `migrations/` (run idempotently by
//! `init()` via `sqlx::migrate!`):
//!
//! ```sql
//! CREATE TABLE jobs (
//!     id TEXT PRIMARY KEY,
//!     command TEXT NOT NULL,
//!     priority INTEGER NOT NULL,
//!     timeout_s INTEGER NOT NULL,
//!     max_retries INTEGER NOT NULL,
//!     attempts INTEGER NOT NULL DEFAULT 0,
//!     state TEXT NOT NULL,
//!     run_at TEXT NOT NULL,
//!     next_attempt_at TEXT NOT NULL,
//!     claimed_by TEXT,
//!     started_at TEXT,
//!     finished_at TEXT,
//!     exit_code INTEGER,
//!     stdout TEXT NOT NULL DEFAULT '',
//!     stderr TEXT NOT NULL DEFAULT '',
//!     error TEXT,
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE config (key TEXT PRIMARY KEY, value INTEGER NOT NULL);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use queuectl_core::{
    Aggregate, AttemptResult, Config, ConfigKey, Job, JobState, JobStore, ListFilter, NewJob, StoreError,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;

/// Default grace period added to a job's own `timeout_s` before a row stuck
/// in `processing` is considered orphaned (§4.1).
pub const DEFAULT_ORPHAN_GRACE_S: i64 = 30;

/// How long `with_retry` keeps retrying a transient "database is locked"
/// condition before surfacing `StoreError::Unavailable` (§4.1, §7).
const RETRY_BUDGET: Duration = Duration::from_secs(5);

/// SQLite-backed [`JobStore`].
#[derive(Clone)]
pub struct SqlJobStore {
    pool: SqlitePool,
}

impl SqlJobStore {
    /// Opens (creating if absent) the SQLite database file at `path` with
    /// WAL journaling and a single-connection pool.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(RETRY_BUDGET);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Fatal(e.to_string()))?;

        Ok(Self { pool })
    }

    /// An in-memory store, for tests.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Fatal(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Retries `op` while it fails with a transient "database is locked"
/// condition, up to [`RETRY_BUDGET`], then surfaces `Unavailable` (§4.1's
/// Failure semantics / §7's Store transient category).
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let start = Instant::now();
    let mut delay = Duration::from_millis(20);
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_busy(&e) => {
                if start.elapsed() >= RETRY_BUDGET {
                    return Err(StoreError::Unavailable(e.to_string()));
                }
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_millis(500));
            }
            Err(e) => return Err(StoreError::Fatal(e.to_string())),
        }
    }
}

fn is_busy(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(de) => {
            let msg = de.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

fn row_to_job(row: sqlx::sqlite::SqliteRow) -> Job {
    let state_str: String = row.get("state");
    Job {
        id: row.get("id"),
        command: row.get("command"),
        priority: row.get("priority"),
        timeout_s: row.get("timeout_s"),
        max_retries: row.get("max_retries"),
        attempts: row.get("attempts"),
        state: state_str.parse().expect("state column always holds a valid JobState"),
        run_at: row.get("run_at"),
        next_attempt_at: row.get("next_attempt_at"),
        claimed_by: row.get("claimed_by"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        exit_code: row.get("exit_code"),
        stdout: row.get("stdout"),
        stderr: row.get("stderr"),
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Versioned embedded migrations (`crates/queuectl-sqlite/migrations/`),
/// idempotent on second invocation (`sqlx::migrate!` records applied
/// versions in its own `_sqlx_migrations` table).
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[async_trait]
impl JobStore for SqlJobStore {
    async fn init(&self) -> Result<(), StoreError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Fatal(e.to_string()))?;

        for key in ConfigKey::ALL {
            with_retry(|| async {
                sqlx::query("INSERT OR IGNORE INTO config (key, value) VALUES (?1, ?2)")
                    .bind(key.as_str())
                    .bind(key.default_value())
                    .execute(&self.pool)
                    .await
            })
            .await?;
        }

        let reaped = self.reap_orphans(Utc::now(), DEFAULT_ORPHAN_GRACE_S).await?;
        if reaped > 0 {
            warn!(count = reaped, "reaped orphaned jobs at startup");
        }

        Ok(())
    }

    async fn insert(&self, job: NewJob) -> Result<Job, StoreError> {
        // Retries busy/locked conditions itself, like `with_retry`, but keeps
        // the raw `sqlx::Error` in scope on the final failure so a unique
        // constraint violation can be classified as `DuplicateId` before it
        // would otherwise be flattened into an opaque `Fatal(String)`.
        let start = Instant::now();
        let mut delay = Duration::from_millis(20);
        loop {
            let attempt = sqlx::query(
                r#"INSERT INTO jobs
                    (id, command, priority, timeout_s, max_retries, attempts, state,
                     run_at, next_attempt_at, claimed_by, started_at, finished_at,
                     exit_code, stdout, stderr, error, created_at, updated_at)
                   VALUES
                    (?1, ?2, ?3, ?4, ?5, 0, 'pending',
                     ?6, ?6, NULL, NULL, NULL,
                     NULL, '', '', NULL, ?7, ?7)
                   RETURNING *"#,
            )
            .bind(&job.id)
            .bind(&job.command)
            .bind(job.priority)
            .bind(job.timeout_s)
            .bind(job.max_retries)
            .bind(job.run_at)
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await;

            match attempt {
                Ok(row) => return Ok(row_to_job(row)),
                Err(e) if is_busy(&e) => {
                    if start.elapsed() >= RETRY_BUDGET {
                        return Err(StoreError::Unavailable(e.to_string()));
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_millis(500));
                }
                Err(e) => {
                    if matches!(&e, sqlx::Error::Database(de) if de.is_unique_violation()) {
                        return Err(StoreError::DuplicateId(job.id));
                    }
                    return Err(StoreError::Fatal(e.to_string()));
                }
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let row = with_retry(|| async {
            sqlx::query("SELECT * FROM jobs WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;
        Ok(row.map(row_to_job))
    }

    async fn list(&self, filter: ListFilter, limit: i64) -> Result<Vec<Job>, StoreError> {
        let rows = match filter {
            ListFilter::Any => {
                with_retry(|| async {
                    sqlx::query("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1")
                        .bind(limit)
                        .fetch_all(&self.pool)
                        .await
                })
                .await?
            }
            ListFilter::State(state) => {
                with_retry(|| async {
                    sqlx::query("SELECT * FROM jobs WHERE state = ?1 ORDER BY created_at DESC LIMIT ?2")
                        .bind(state.as_str())
                        .bind(limit)
                        .fetch_all(&self.pool)
                        .await
                })
                .await?
            }
        };
        Ok(rows.into_iter().map(row_to_job).collect())
    }

    async fn aggregate(&self) -> Result<Aggregate, StoreError> {
        let row = with_retry(|| async {
            sqlx::query(
                r#"SELECT
                    SUM(CASE WHEN state = 'pending' THEN 1 ELSE 0 END) AS pending,
                    SUM(CASE WHEN state = 'processing' THEN 1 ELSE 0 END) AS processing,
                    SUM(CASE WHEN state = 'completed' THEN 1 ELSE 0 END) AS completed,
                    SUM(CASE WHEN state = 'failed' THEN 1 ELSE 0 END) AS failed,
                    SUM(CASE WHEN state = 'dead' THEN 1 ELSE 0 END) AS dead
                   FROM jobs"#,
            )
            .fetch_one(&self.pool)
            .await
        })
        .await?;

        let runtimes = with_retry(|| async {
            sqlx::query(
                "SELECT started_at, finished_at FROM jobs WHERE state = 'completed' AND started_at IS NOT NULL AND finished_at IS NOT NULL",
            )
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        let mut total = 0.0f64;
        let mut count = 0u32;
        for r in runtimes {
            let started: DateTime<Utc> = r.get("started_at");
            let finished: DateTime<Utc> = r.get("finished_at");
            total += (finished - started).num_milliseconds() as f64 / 1000.0;
            count += 1;
        }

        Ok(Aggregate {
            pending: row.try_get::<Option<i64>, _>("pending").ok().flatten().unwrap_or(0),
            processing: row.try_get::<Option<i64>, _>("processing").ok().flatten().unwrap_or(0),
            completed: row.try_get::<Option<i64>, _>("completed").ok().flatten().unwrap_or(0),
            failed: row.try_get::<Option<i64>, _>("failed").ok().flatten().unwrap_or(0),
            dead: row.try_get::<Option<i64>, _>("dead").ok().flatten().unwrap_or(0),
            avg_completed_runtime_s: if count > 0 { Some(total / count as f64) } else { None },
        })
    }

    async fn set_config(&self, key: ConfigKey, value: i64) -> Result<(), StoreError> {
        key.validate(value).map_err(|reason| StoreError::InvalidConfigValue {
            key: key.to_string(),
            reason,
        })?;
        with_retry(|| async {
            sqlx::query(
                "INSERT INTO config (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key.as_str())
            .bind(value)
            .execute(&self.pool)
            .await
        })
        .await?;
        Ok(())
    }

    async fn get_config(&self) -> Result<Config, StoreError> {
        let rows = with_retry(|| async { sqlx::query("SELECT key, value FROM config").fetch_all(&self.pool).await })
            .await?;

        let mut config = Config::default();
        for row in rows {
            let key: String = row.get("key");
            let value: i64 = row.get("value");
            if let Ok(key) = key.parse::<ConfigKey>() {
                config.set(key, value);
            }
        }
        Ok(config)
    }

    async fn claim_next(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
        with_retry(|| async {
            let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
            let row = sqlx::query(
                r#"WITH candidate AS (
                    SELECT id FROM jobs
                    WHERE (state = 'pending' OR (state = 'failed' AND next_attempt_at <= ?1))
                      AND run_at <= ?1
                    ORDER BY priority DESC, created_at ASC
                    LIMIT 1
                )
                UPDATE jobs
                SET state = 'processing',
                    claimed_by = ?2,
                    started_at = ?1,
                    attempts = attempts + 1,
                    updated_at = ?1
                WHERE id IN (SELECT id FROM candidate)
                  AND state IN ('pending', 'failed')
                RETURNING *"#,
            )
            .bind(now)
            .bind(worker_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(row)
        })
        .await
        .map(|row| row.map(row_to_job))
    }

    async fn finalize_completed(&self, id: &str, result: AttemptResult) -> Result<(), StoreError> {
        let affected = with_retry(|| async {
            sqlx::query(
                r#"UPDATE jobs
                   SET state = 'completed', claimed_by = NULL, finished_at = ?1,
                       exit_code = ?2, stdout = ?3, stderr = ?4, error = NULL, updated_at = ?1
                   WHERE id = ?5 AND state = 'processing'"#,
            )
            .bind(result.finished_at)
            .bind(result.exit_code)
            .bind(&result.stdout)
            .bind(&result.stderr)
            .bind(id)
            .execute(&self.pool)
            .await
        })
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn reschedule_retry(
        &self,
        id: &str,
        next_attempt_at: DateTime<Utc>,
        error: &str,
        result: AttemptResult,
    ) -> Result<(), StoreError> {
        let affected = with_retry(|| async {
            sqlx::query(
                r#"UPDATE jobs
                   SET state = 'failed', claimed_by = NULL, finished_at = ?1,
                       exit_code = ?2, stdout = ?3, stderr = ?4, error = ?5,
                       next_attempt_at = ?6, updated_at = ?1
                   WHERE id = ?7 AND state = 'processing'"#,
            )
            .bind(result.finished_at)
            .bind(result.exit_code)
            .bind(&result.stdout)
            .bind(&result.stderr)
            .bind(error)
            .bind(next_attempt_at)
            .bind(id)
            .execute(&self.pool)
            .await
        })
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn move_to_dead(&self, id: &str, error: &str, result: AttemptResult) -> Result<(), StoreError> {
        let affected = with_retry(|| async {
            sqlx::query(
                r#"UPDATE jobs
                   SET state = 'dead', claimed_by = NULL, finished_at = ?1,
                       exit_code = ?2, stdout = ?3, stderr = ?4, error = ?5, updated_at = ?1
                   WHERE id = ?6 AND state = 'processing'"#,
            )
            .bind(result.finished_at)
            .bind(result.exit_code)
            .bind(&result.stdout)
            .bind(&result.stderr)
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await
        })
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn retry_from_dlq(&self, id: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        let affected = with_retry(|| async {
            sqlx::query(
                r#"UPDATE jobs
                   SET state = 'pending', attempts = 0, next_attempt_at = ?1,
                       claimed_by = NULL, started_at = NULL, finished_at = NULL,
                       exit_code = NULL, error = NULL, updated_at = ?1
                   WHERE id = ?2 AND state = 'dead'"#,
            )
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
        })
        .await?
        .rows_affected();

        if affected == 0 {
            // Distinguish "doesn't exist" from "exists but not dead" (§8
            // property covering DLQ retry idempotence).
            return match self.get_by_id(id).await? {
                Some(_) => Err(StoreError::NotDead(id.to_string())),
                None => Err(StoreError::NotFound(id.to_string())),
            };
        }
        Ok(())
    }

    async fn reap_orphans(&self, now: DateTime<Utc>, grace_s: i64) -> Result<u64, StoreError> {
        let rows = with_retry(|| async {
            sqlx::query("SELECT id, started_at, timeout_s FROM jobs WHERE state = 'processing'")
                .fetch_all(&self.pool)
                .await
        })
        .await?;

        let mut reaped = 0u64;
        for row in rows {
            let id: String = row.get("id");
            let started_at: Option<DateTime<Utc>> = row.get("started_at");
            let timeout_s: i64 = row.get("timeout_s");
            let Some(started_at) = started_at else { continue };
            let deadline = started_at + ChronoDuration::seconds(timeout_s + grace_s);
            if now < deadline {
                continue;
            }
            let affected = with_retry(|| async {
                sqlx::query(
                    r#"UPDATE jobs SET state = 'failed', claimed_by = NULL, error = 'orphaned', updated_at = ?1
                       WHERE id = ?2 AND state = 'processing'"#,
                )
                .bind(now)
                .bind(&id)
                .execute(&self.pool)
                .await
            })
            .await?
            .rows_affected();
            if affected > 0 {
                reaped += 1;
            }
        }
        Ok(reaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store() -> SqlJobStore {
        let store = SqlJobStore::connect_in_memory().await.unwrap();
        store.init().await.unwrap();
        store
    }

    fn new_job(id: &str, now: DateTime<Utc>) -> NewJob {
        NewJob {
            id: id.to_string(),
            command: "echo hi".to_string(),
            priority: 0,
            timeout_s: 30,
            max_retries: 3,
            run_at: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = store().await;
        let now = Utc::now();
        let inserted = store.insert(new_job("j1", now)).await.unwrap();
        assert_eq!(inserted.state, JobState::Pending);
        let fetched = store.get_by_id("j1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "j1");
        assert_eq!(fetched.attempts, 0);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = store().await;
        let now = Utc::now();
        store.insert(new_job("dup", now)).await.unwrap();
        let err = store.insert(new_job("dup", now)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn claim_next_is_exclusive_across_concurrent_workers() {
        let store = Arc::new(store().await);
        let now = Utc::now();
        store.insert(new_job("only-one", now)).await.unwrap();

        let s1 = store.clone();
        let s2 = store.clone();
        let (a, b) = tokio::join!(s1.claim_next("worker-1", now), s2.claim_next("worker-2", now));
        let claims = [a.unwrap(), b.unwrap()];
        let claimed_count = claims.iter().filter(|c| c.is_some()).count();
        assert_eq!(claimed_count, 1);
    }

    #[tokio::test]
    async fn priority_then_created_at_tie_break() {
        let store = store().await;
        let now = Utc::now();
        let mut low = new_job("low", now);
        low.priority = 0;
        let mut high = new_job("high", now + ChronoDuration::milliseconds(1));
        high.priority = 10;
        store.insert(low).await.unwrap();
        store.insert(high).await.unwrap();

        let claimed = store
            .claim_next("worker-1", now + ChronoDuration::seconds(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, "high");
    }

    #[tokio::test]
    async fn future_run_at_is_not_claimable() {
        let store = store().await;
        let now = Utc::now();
        let mut future_job = new_job("future", now);
        future_job.run_at = now + ChronoDuration::seconds(60);
        store.insert(future_job).await.unwrap();

        let claimed = store.claim_next("worker-1", now).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn dlq_retry_is_idempotent_only_once() {
        let store = store().await;
        let now = Utc::now();
        store.insert(new_job("dead-job", now)).await.unwrap();
        store.claim_next("worker-1", now).await.unwrap();
        store
            .move_to_dead(
                "dead-job",
                "boom",
                AttemptResult {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: String::new(),
                    finished_at: now,
                },
            )
            .await
            .unwrap();

        store.retry_from_dlq("dead-job").await.unwrap();
        let err = store.retry_from_dlq("dead-job").await.unwrap_err();
        assert!(matches!(err, StoreError::NotDead(_)));
    }

    #[tokio::test]
    async fn orphaned_processing_rows_are_reaped_after_grace() {
        let store = store().await;
        let now = Utc::now();
        let mut job = new_job("stuck", now);
        job.timeout_s = 1;
        store.insert(job).await.unwrap();
        store.claim_next("worker-1", now).await.unwrap();

        let later = now + ChronoDuration::seconds(1 + DEFAULT_ORPHAN_GRACE_S + 1);
        let reaped = store.reap_orphans(later, DEFAULT_ORPHAN_GRACE_S).await.unwrap();
        assert_eq!(reaped, 1);
        let job = store.get_by_id("stuck").await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("orphaned"));
    }

    #[tokio::test]
    async fn config_set_then_get_round_trips() {
        let store = store().await;
        store.set_config(ConfigKey::BackoffBase, 5).await.unwrap();
        let config = store.get_config().await.unwrap();
        assert_eq!(config.backoff_base, 5);
        assert_eq!(config.max_retries, 3);
    }

    #[tokio::test]
    async fn set_config_rejects_out_of_range_values() {
        let store = store().await;
        let err = store.set_config(ConfigKey::BackoffBase, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfigValue { .. }));
    }
}
