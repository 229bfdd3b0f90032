//! End-to-end scenarios (spec §8, S1-S6): a real `SqlJobStore`, a real
//! `PoolSupervisor` running real child processes, and the system clock.
//! These exercise the full claim -> execute -> finalize path, not just the
//! store in isolation (see `src/lib.rs`'s unit tests for that).

use queuectl_core::{
    ActiveWorkerCounter, Clock, ConfigKey, EnqueueSpec, JobManager, JobState, JobStore, PoolSupervisor, SystemClock,
};
use queuectl_sqlite::SqlJobStore;
use std::sync::Arc;
use std::time::Duration;

async fn fresh_store() -> Arc<SqlJobStore> {
    let store = SqlJobStore::connect_in_memory().await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

fn spec(id: &str, command: &str) -> EnqueueSpec {
    EnqueueSpec {
        id: id.to_string(),
        command: command.to_string(),
        priority: None,
        timeout_s: None,
        max_retries: None,
        run_at: None,
    }
}

/// S1 - success path: `echo hi` completes within 2s with exit 0 and one
/// attempt.
#[tokio::test]
async fn s1_success_path() {
    let store = fresh_store().await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = JobManager::new(store.clone(), clock.clone());
    manager.enqueue(spec("j1", "echo hi")).await.unwrap();

    let pool = PoolSupervisor::spawn(1, store.clone(), clock, ActiveWorkerCounter::new());
    tokio::time::sleep(Duration::from_secs(2)).await;
    pool.shutdown().await;

    let job = store.get_by_id("j1").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.stdout.contains("hi"));
    assert_eq!(job.attempts, 1);
}

/// S2 - priority wins: a priority-10 job finishes before a priority-0 job
/// submitted earlier, when a single worker serializes them.
#[tokio::test]
async fn s2_priority_wins() {
    let store = fresh_store().await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = JobManager::new(store.clone(), clock.clone());

    let mut low = spec("low", "echo L");
    low.priority = Some(0);
    manager.enqueue(low).await.unwrap();

    let mut high = spec("high", "echo H");
    high.priority = Some(10);
    manager.enqueue(high).await.unwrap();

    let pool = PoolSupervisor::spawn(1, store.clone(), clock, ActiveWorkerCounter::new());
    tokio::time::sleep(Duration::from_secs(2)).await;
    pool.shutdown().await;

    let low = store.get_by_id("low").await.unwrap().unwrap();
    let high = store.get_by_id("high").await.unwrap().unwrap();
    assert_eq!(low.state, JobState::Completed);
    assert_eq!(high.state, JobState::Completed);
    assert!(high.finished_at.unwrap() < low.finished_at.unwrap());
}

/// S3 - retry then succeed: a sentinel file makes the first attempt fail and
/// the second succeed; the delay between attempts honors the backoff.
#[tokio::test]
async fn s3_retry_then_succeed() {
    let store = fresh_store().await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = JobManager::new(store.clone(), clock.clone());

    let sentinel = tempfile::NamedTempFile::new().unwrap();
    let sentinel_path = sentinel.path().to_path_buf();
    std::fs::remove_file(&sentinel_path).ok();
    let command = format!(
        "test -f {path} && exit 0 || (touch {path} && exit 1)",
        path = sentinel_path.display()
    );

    let mut job = spec("retry-job", &command);
    job.max_retries = Some(3);
    manager.enqueue(job).await.unwrap();

    let started = tokio::time::Instant::now();
    let pool = PoolSupervisor::spawn(1, store.clone(), clock, ActiveWorkerCounter::new());
    tokio::time::sleep(Duration::from_secs(5)).await;
    pool.shutdown().await;

    let job = store.get_by_id("retry-job").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts, 2);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

/// S4 - exhaust retries -> DLQ: `max_retries=1` means two total attempts;
/// both fail, the job lands in `dead`, and it shows up in the DLQ listing.
#[tokio::test]
async fn s4_exhaust_retries_to_dlq() {
    let store = fresh_store().await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = JobManager::new(store.clone(), clock.clone());

    let mut job = spec("bad", "exit 1");
    job.max_retries = Some(1);
    manager.enqueue(job).await.unwrap();

    let pool = PoolSupervisor::spawn(1, store.clone(), clock, ActiveWorkerCounter::new());
    tokio::time::sleep(Duration::from_secs(4)).await;
    pool.shutdown().await;

    let job = store.get_by_id("bad").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.attempts, 2);

    let dlq = store.list(queuectl_core::ListFilter::State(JobState::Dead), 50).await.unwrap();
    assert!(dlq.iter().any(|j| j.id == "bad"));
}

/// S5 - timeout: a job that sleeps longer than its timeout is terminated and
/// (with no retries configured) lands in `dead` with a timeout-mentioning
/// error.
#[tokio::test]
async fn s5_timeout_moves_to_dead() {
    let store = fresh_store().await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = JobManager::new(store.clone(), clock.clone());

    let mut job = spec("slow", "sleep 30");
    job.timeout_s = Some(1);
    job.max_retries = Some(0);
    manager.enqueue(job).await.unwrap();

    let pool = PoolSupervisor::spawn(1, store.clone(), clock, ActiveWorkerCounter::new());
    tokio::time::sleep(Duration::from_secs(3)).await;
    pool.shutdown().await;

    let job = store.get_by_id("slow").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert!(job.error.as_deref().unwrap_or("").contains("time"));
}

/// Property 7 (§8): enqueuing a spec that omits priority/timeout/max_retries
/// fills them from the *current* Config, not from `Config::default()` - a
/// regression in the manager's field-mapping would only show up once the
/// Config on record differs from the hardcoded defaults.
#[tokio::test]
async fn enqueue_fills_defaults_from_non_default_config() {
    let store = fresh_store().await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = JobManager::new(store.clone(), clock);

    store.set_config(ConfigKey::DefaultPriority, 7).await.unwrap();
    store.set_config(ConfigKey::DefaultTimeout, 120).await.unwrap();
    store.set_config(ConfigKey::MaxRetries, 9).await.unwrap();

    manager.enqueue(spec("defaults-job", "echo hi")).await.unwrap();

    let job = store.get_by_id("defaults-job").await.unwrap().unwrap();
    assert_eq!(job.priority, 7);
    assert_eq!(job.timeout_s, 120);
    assert_eq!(job.max_retries, 9);
}

/// S6 - restart durability: three pending jobs survive a worker-pool restart
/// with no duplicate processing (property #1 restated across the restart
/// boundary), and all three eventually complete.
#[tokio::test]
async fn s6_restart_durability() {
    let store = fresh_store().await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = JobManager::new(store.clone(), clock.clone());

    for id in ["a", "b", "c"] {
        manager.enqueue(spec(id, "echo hi")).await.unwrap();
    }

    let pool = PoolSupervisor::spawn(2, store.clone(), clock.clone(), ActiveWorkerCounter::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.shutdown().await;

    let pool = PoolSupervisor::spawn(2, store.clone(), clock, ActiveWorkerCounter::new());
    tokio::time::sleep(Duration::from_secs(2)).await;
    pool.shutdown().await;

    for id in ["a", "b", "c"] {
        let job = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed, "job {id} did not complete");
        assert_eq!(job.attempts, 1, "job {id} was processed more than once");
    }
}
