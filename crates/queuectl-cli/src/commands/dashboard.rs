//! `dashboard start [--bind ADDR]` (§6.4).

use super::CommandError;
use queuectl_core::{ActiveWorkerCounter, JobStore, StatusReader};
use std::sync::Arc;

pub async fn start(store: Arc<dyn JobStore>, active_workers: ActiveWorkerCounter, bind: &str) -> Result<(), CommandError> {
    let addr = bind
        .parse()
        .map_err(|e| CommandError::UserInput(format!("invalid --bind address '{bind}': {e}")))?;
    let reader = StatusReader::new(store, active_workers);
    queuectl_dashboard::serve(reader, addr)
        .await
        .map_err(|e| CommandError::Transient(e.to_string()))
}
