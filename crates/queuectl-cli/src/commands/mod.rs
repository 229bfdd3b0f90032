//! Subcommand implementations and the shared error-to-exit-code mapping
//! (§6.1, §7).

mod config;
mod dashboard;
mod dlq;
mod init;
mod job;
mod worker;

use crate::output::OutputFormat;
use crate::{ConfigAction, DashboardAction, DlqAction, WorkerAction};
use queuectl_core::{Clock, JobManager, JobStore, ManagerError, StatusReader, StoreError};
use std::path::PathBuf;
use std::sync::Arc;

/// The three outcomes §6.1's exit codes distinguish.
pub enum CommandError {
    /// Exit code 1: bad JSON, unknown id, invalid config value, duplicate id.
    UserInput(String),
    /// Exit code 2: store unavailable after internal retries, or other
    /// non-retriable store failure.
    Transient(String),
    /// Exit code 130: `worker start` observed a clean shutdown via
    /// cancellation. Not an error; carried through this type purely so
    /// `main` can map it to the right exit code.
    Interrupted,
}

impl From<ManagerError> for CommandError {
    fn from(e: ManagerError) -> Self {
        if e.is_user_error() {
            CommandError::UserInput(e.to_string())
        } else {
            CommandError::Transient(e.to_string())
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        if e.is_user_error() {
            CommandError::UserInput(e.to_string())
        } else {
            CommandError::Transient(e.to_string())
        }
    }
}

pub async fn dispatch(
    command: crate::Commands,
    format: OutputFormat,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    data_dir: PathBuf,
) -> Result<(), CommandError> {
    let manager = JobManager::new(store.clone(), clock.clone());
    let active_workers = queuectl_core::ActiveWorkerCounter::new();
    let reader = StatusReader::new(store.clone(), active_workers.clone());

    match command {
        crate::Commands::Init => init::run(format).await,
        crate::Commands::Enqueue { json } => job::enqueue(format, &manager, &json).await,
        crate::Commands::List { state, limit } => job::list(format, &reader, state, limit).await,
        crate::Commands::Status => job::status(format, &reader).await,
        crate::Commands::Logs { id } => job::logs(format, &reader, &id).await,
        crate::Commands::Metrics => job::metrics(format, &reader).await,
        crate::Commands::Worker { action } => match action {
            WorkerAction::Start { count } => worker::start(store, clock, active_workers, count, &data_dir).await,
            WorkerAction::Reap => worker::reap(store, clock).await,
        },
        crate::Commands::Dlq { action } => match action {
            DlqAction::List => dlq::list(format, &reader).await,
            DlqAction::Retry { id } => dlq::retry(format, &manager, &id).await,
        },
        crate::Commands::Config { action } => match action {
            ConfigAction::Show => config::show(format, &manager).await,
            ConfigAction::Set { key, value } => config::set(format, &manager, &key, value).await,
        },
        crate::Commands::Dashboard { action } => match action {
            DashboardAction::Start { bind } => dashboard::start(store, active_workers, &bind).await,
        },
    }
}
