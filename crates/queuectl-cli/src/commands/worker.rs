//! `worker start`, `worker reap` (§4.4, §4.5).

use super::CommandError;
use crate::log_sink::FileLogSink;
use queuectl_core::{ActiveWorkerCounter, Clock, JobStore, LogSink, NoopLogSink, PoolSupervisor};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn start(
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    active_workers: ActiveWorkerCounter,
    count: usize,
    data_dir: &Path,
) -> Result<(), CommandError> {
    let log_sink: Arc<dyn LogSink> = match FileLogSink::new(data_dir) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!(error = %e, "failed to prepare job log directory, job logs will not be written to disk");
            Arc::new(NoopLogSink)
        }
    };
    let pool = PoolSupervisor::spawn_with_log_sink(count, store, clock, active_workers, log_sink);
    info!(count, "worker pool started, waiting for Ctrl-C");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CommandError::Transient(format!("failed to install signal handler: {e}")))?;

    info!("shutdown signal received");
    pool.shutdown().await;
    Err(CommandError::Interrupted)
}

pub async fn reap(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Result<(), CommandError> {
    let reaped = store.reap_orphans(clock.now(), queuectl_sqlite::DEFAULT_ORPHAN_GRACE_S).await?;
    println!("reaped {reaped} orphaned job(s)");
    Ok(())
}
