//! `queuectl init` — schema creation happens unconditionally at process
//! startup (§4.1's "on Store startup" sweep applies every run); this
//! subcommand exists so first-time setup has an explicit, discoverable
//! entry point.

use super::CommandError;
use crate::output::OutputFormat;
use serde_json::json;

pub async fn run(format: OutputFormat) -> Result<(), CommandError> {
    match format {
        OutputFormat::Json => println!("{}", json!({"status": "initialized"})),
        OutputFormat::Text => println!("database ready"),
    }
    Ok(())
}
