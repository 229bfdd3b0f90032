//! QueueCTL — a single-host background job orchestrator (CLI entry point).

mod commands;
mod log_sink;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use output::OutputFormat;
use queuectl_core::{Clock, SystemClock};
use queuectl_sqlite::SqlJobStore;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// QueueCTL - a single-host background job orchestrator.
#[derive(Parser, Debug)]
#[command(name = "queuectl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the database file (default ./.queuectl).
    #[arg(long, global = true, env = "QUEUECTL_DATA_DIR", default_value = "./.queuectl")]
    data_dir: PathBuf,

    /// Output format for command results.
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database file and seed default configuration.
    Init,
    /// Submit a new job from a JSON payload (§6.2).
    Enqueue {
        /// The enqueue payload as a JSON object.
        json: String,
    },
    /// List jobs, optionally filtered by state.
    List {
        #[arg(long, value_name = "STATE")]
        state: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show aggregate job counts and active worker count.
    Status,
    /// Show the captured output of a job's last attempt.
    Logs {
        /// The job id to show logs for.
        id: String,
    },
    /// Worker pool management.
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },
    /// Show aggregate counts and mean completed runtime.
    Metrics,
    /// Dead letter queue management.
    Dlq {
        #[command(subcommand)]
        action: DlqAction,
    },
    /// Runtime configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Read-only HTTP dashboard.
    Dashboard {
        #[command(subcommand)]
        action: DashboardAction,
    },
}

#[derive(Subcommand, Debug)]
enum WorkerAction {
    /// Start a pool of N workers and run until Ctrl-C.
    Start {
        #[arg(long, default_value_t = 4)]
        count: usize,
    },
    /// Reset orphaned `processing` rows back to `failed` (§4.1).
    Reap,
}

#[derive(Subcommand, Debug)]
enum DlqAction {
    /// List jobs currently in the dead-letter queue.
    List,
    /// Requeue a dead job as `pending`, resetting its attempt count.
    Retry {
        /// The job id to requeue.
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the current configuration.
    Show,
    /// Set a configuration value.
    Set {
        /// One of backoff_base, default_priority, default_timeout, max_retries.
        key: String,
        value: i64,
    },
}

#[derive(Subcommand, Debug)]
enum DashboardAction {
    /// Start the read-only HTTP dashboard.
    Start {
        /// Loopback address to bind (§6.4).
        #[arg(long, default_value = "127.0.0.1:9797")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let db_path = cli.data_dir.join("queuectl.db");
    let store = match SqlJobStore::connect(&db_path).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    // The orphan-recovery sweep runs on every Store startup, per §4.1 — not
    // only on an explicit `init` invocation.
    if let Err(e) = store.init().await {
        eprintln!("Error: {e}");
        return ExitCode::from(2);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match commands::dispatch(cli.command, cli.format, store, clock, cli.data_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(commands::CommandError::UserInput(msg)) => {
            eprintln!("Error: {msg}");
            ExitCode::from(1)
        }
        Err(commands::CommandError::Transient(msg)) => {
            eprintln!("Error: {msg}");
            ExitCode::from(2)
        }
        Err(commands::CommandError::Interrupted) => ExitCode::from(130),
    }
}

fn init_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "queuectl=info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
