//! `dlq list`, `dlq retry <id>` (§4.2's `DLQList`/`DLQRetry`).

use super::CommandError;
use crate::output::{emit, OutputFormat};
use queuectl_core::{Job, JobManager, StatusReader};

const DEFAULT_LIMIT: i64 = 50;

pub async fn list(format: OutputFormat, reader: &StatusReader) -> Result<(), CommandError> {
    let jobs = reader.dlq_list(DEFAULT_LIMIT).await?;
    emit(format, &jobs, |jobs: &Vec<Job>| {
        if jobs.is_empty() {
            println!("dead-letter queue is empty");
        }
        for job in jobs {
            println!(
                "{:<20} attempts={:<3} error={}",
                job.id,
                job.attempts,
                job.error.as_deref().unwrap_or("unknown")
            );
        }
    });
    Ok(())
}

pub async fn retry(format: OutputFormat, manager: &JobManager, id: &str) -> Result<(), CommandError> {
    manager.dlq_retry(id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({"id": id, "status": "requeued"})),
        OutputFormat::Text => println!("requeued '{id}'"),
    }
    Ok(())
}
