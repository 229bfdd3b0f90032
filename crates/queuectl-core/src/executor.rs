//! Runs exactly one attempt of one job (component C, §4.3).
//!
//! Stateless and pure with respect to the Store — it does no persistence.
//! Grounded on the pack's shell-tool spawn plumbing (`tokio::process::
//! Command`, `pre_exec` process-group setup, piped stdio) generalized from
//! a fixed argv invocation to an opaque shell command line, since QueueCTL
//! jobs are shell commands rather than structured tool calls.

use crate::model::cap_output;
use crate::process_group::{kill_child_process_group, set_process_group, terminate_child_process_group};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Grace period between a soft (SIGTERM) and hard (SIGKILL) termination on
/// timeout, per §4.3.
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Per-stream output cap, per §4.3 / `model::OUTPUT_CAP_BYTES`.
const READ_CHUNK: usize = 8 * 1024;

/// The result of running one attempt of a job's command.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_s: f64,
    pub terminated_by_timeout: bool,
    pub spawn_error: Option<String>,
}

impl Outcome {
    /// Classification per §4.4 step 3: completed iff exit 0, no timeout, no
    /// spawn error.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0) && !self.terminated_by_timeout && self.spawn_error.is_none()
    }

    /// A short human-readable reason, for the `error` column, when the
    /// attempt did not succeed.
    pub fn failure_reason(&self) -> String {
        if let Some(err) = &self.spawn_error {
            return format!("spawn failed: {err}");
        }
        if self.terminated_by_timeout {
            return "timed out".to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs `command` via the host's shell, capping output and enforcing
/// `timeout_s` by wall clock.
pub struct Executor;

impl Executor {
    pub async fn run(command: &str, timeout_s: i64) -> Outcome {
        let start = Instant::now();

        let mut cmd = Command::new(shell_program());
        cmd.arg(shell_flag()).arg(command);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        #[cfg(unix)]
        unsafe {
            use std::os::unix::process::CommandExt;
            cmd.pre_exec(|| set_process_group());
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Outcome {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_s: start.elapsed().as_secs_f64(),
                    terminated_by_timeout: false,
                    spawn_error: Some(e.to_string()),
                };
            }
        };

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move { drain_capped(&mut stdout_pipe).await });
        let stderr_task = tokio::spawn(async move { drain_capped(&mut stderr_pipe).await });

        let timeout = Duration::from_secs(timeout_s.max(0) as u64);
        let (exit_code, terminated_by_timeout) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(_)) => (None, false),
            Err(_) => {
                let _ = terminate_child_process_group(&mut child);
                let status = match tokio::time::timeout(TIMEOUT_GRACE, child.wait()).await {
                    Ok(Ok(status)) => Some(status),
                    _ => {
                        let _ = kill_child_process_group(&mut child);
                        child.wait().await.ok()
                    }
                };
                (status.and_then(|s| s.code()), true)
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Outcome {
            exit_code,
            stdout: cap_output(&stdout),
            stderr: cap_output(&stderr),
            duration_s: start.elapsed().as_secs_f64(),
            terminated_by_timeout,
            spawn_error: None,
        }
    }
}

/// Reads up to `OUTPUT_CAP_BYTES` + one chunk from `pipe`, then keeps
/// draining and discarding so the child never blocks on a full pipe buffer.
async fn drain_capped(pipe: &mut Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < crate::model::OUTPUT_CAP_BYTES {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn shell_program() -> &'static str {
    "/bin/sh"
}

#[cfg(unix)]
fn shell_flag() -> &'static str {
    "-c"
}

#[cfg(not(unix))]
fn shell_program() -> &'static str {
    "cmd"
}

#[cfg(not(unix))]
fn shell_flag() -> &'static str {
    "/C"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_exit_zero_is_classified_completed() {
        let outcome = Executor::run("echo hi", 5).await;
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stdout.contains("hi"));
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_success() {
        let outcome = Executor::run("exit 1", 5).await;
        assert_eq!(outcome.exit_code, Some(1));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn timeout_kills_the_child_and_marks_terminated() {
        let start = Instant::now();
        let outcome = Executor::run("sleep 30", 1).await;
        assert!(outcome.terminated_by_timeout);
        assert!(!outcome.is_success());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn spawn_error_is_captured_and_not_success() {
        let outcome = Executor::run_program_missing_for_test().await;
        assert!(outcome.spawn_error.is_some());
        assert!(!outcome.is_success());
    }

    impl Executor {
        /// Test-only helper that bypasses the shell to force a spawn error
        /// deterministically (an unresolvable program name).
        async fn run_program_missing_for_test() -> Outcome {
            let start = Instant::now();
            match Command::new("queuectl-definitely-not-a-real-binary-xyz").spawn() {
                Ok(_) => unreachable!("binary should not exist"),
                Err(e) => Outcome {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_s: start.elapsed().as_secs_f64(),
                    terminated_by_timeout: false,
                    spawn_error: Some(e.to_string()),
                },
            }
        }
    }
}
