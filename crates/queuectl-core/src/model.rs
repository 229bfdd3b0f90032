//! The Job record and its lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of bytes captured per output stream before truncation.
pub const OUTPUT_CAP_BYTES: usize = 1024 * 1024;

/// Marker appended to a captured stream once it has been truncated.
pub const TRUNCATION_MARKER: &str = "\u{2026}[truncated]";

/// A job's position in its lifecycle (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}

/// A single durable unit of work (§3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub priority: i64,
    pub timeout_s: i64,
    pub max_retries: i64,
    pub attempts: i64,
    pub state: JobState,
    pub run_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Truncate `s` to at most [`OUTPUT_CAP_BYTES`], appending [`TRUNCATION_MARKER`]
/// when truncation occurs. Operates on UTF-8 char boundaries.
pub fn cap_output(s: &str) -> String {
    if s.len() <= OUTPUT_CAP_BYTES {
        return s.to_string();
    }
    let mut end = OUTPUT_CAP_BYTES;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = s[..end].to_string();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_str() {
        for state in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
            JobState::Dead,
        ] {
            let parsed: JobState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn cap_output_leaves_short_strings_untouched() {
        assert_eq!(cap_output("hi"), "hi");
    }

    #[test]
    fn cap_output_truncates_and_marks_long_strings() {
        let long = "a".repeat(OUTPUT_CAP_BYTES + 10);
        let capped = cap_output(&long);
        assert!(capped.len() < long.len());
        assert!(capped.ends_with(TRUNCATION_MARKER));
    }
}
