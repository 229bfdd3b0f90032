//! Per-job log file writing (§6.3): one informational text file under
//! `<data-dir>/logs/<id>.log` per job id, containing the final captured
//! stdout/stderr. The Store row remains authoritative; this is a best-effort
//! side channel, grounded on the teacher's stateless-effect style (no
//! feedback into the state machine on failure).

use queuectl_core::LogSink;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    /// Ensures `<data_dir>/logs` exists and returns a sink that writes into it.
    pub fn new(data_dir: &std::path::Path) -> std::io::Result<Self> {
        let dir = data_dir.join("logs");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl LogSink for FileLogSink {
    fn write(&self, job_id: &str, stdout: &str, stderr: &str, error: Option<&str>) {
        let path = self.dir.join(format!("{job_id}.log"));
        let mut contents = String::new();
        if let Some(error) = error {
            contents.push_str("--- error ---\n");
            contents.push_str(error);
            contents.push('\n');
        }
        contents.push_str("--- stdout ---\n");
        contents.push_str(stdout);
        contents.push_str("\n--- stderr ---\n");
        contents.push_str(stderr);
        contents.push('\n');

        if let Err(e) = fs::write(&path, contents) {
            warn!(job = %job_id, path = %path.display(), error = %e, "failed to write job log file");
        }
    }
}
