//! `enqueue`, `list`, `status`, `logs`, `metrics` — the Job Manager and
//! Status Reader surfaces (§4.2, §4.6).

use super::CommandError;
use crate::output::{emit, OutputFormat};
use queuectl_core::{EnqueueSpec, Job, JobManager, JobState, StatusReader};

pub async fn enqueue(format: OutputFormat, manager: &JobManager, json: &str) -> Result<(), CommandError> {
    let spec: EnqueueSpec =
        serde_json::from_str(json).map_err(|e| CommandError::UserInput(format!("malformed enqueue JSON: {e}")))?;
    let job = manager.enqueue(spec).await?;
    emit(format, &job, |job| {
        println!("enqueued '{}' (priority={}, state={})", job.id, job.priority, job.state);
    });
    Ok(())
}

pub async fn list(
    format: OutputFormat,
    reader: &StatusReader,
    state: Option<String>,
    limit: i64,
) -> Result<(), CommandError> {
    let state = match state {
        Some(s) => Some(s.parse::<JobState>().map_err(CommandError::UserInput)?),
        None => None,
    };
    let jobs = reader.list(state, limit).await?;
    emit(format, &jobs, |jobs: &Vec<Job>| {
        if jobs.is_empty() {
            println!("no jobs");
        }
        for job in jobs {
            println!(
                "{:<20} {:<12} priority={:<4} attempts={:<3} command={}",
                job.id, job.state, job.priority, job.attempts, job.command
            );
        }
    });
    Ok(())
}

pub async fn status(format: OutputFormat, reader: &StatusReader) -> Result<(), CommandError> {
    let snapshot = reader.status().await?;
    emit(format, &snapshot, |s| {
        println!(
            "pending={} processing={} completed={} failed={} dead={} active_workers={}",
            s.aggregate.pending, s.aggregate.processing, s.aggregate.completed, s.aggregate.failed, s.aggregate.dead, s.active_workers
        );
    });
    Ok(())
}

pub async fn metrics(format: OutputFormat, reader: &StatusReader) -> Result<(), CommandError> {
    let snapshot = reader.metrics().await?;
    emit(format, &snapshot, |m| {
        println!(
            "pending={} processing={} completed={} failed={} dead={} avg_completed_runtime_s={}",
            m.pending,
            m.processing,
            m.completed,
            m.failed,
            m.dead,
            m.avg_completed_runtime_s.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".to_string())
        );
    });
    Ok(())
}

pub async fn logs(format: OutputFormat, reader: &StatusReader, id: &str) -> Result<(), CommandError> {
    let logs = reader.logs(id).await?;
    emit(format, &logs, |l| {
        println!("exit_code={}", l.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "n/a".to_string()));
        println!("--- stdout ---\n{}", l.stdout);
        println!("--- stderr ---\n{}", l.stderr);
    });
    Ok(())
}
