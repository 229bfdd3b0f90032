//! `config show`, `config set <key> <value>` (§3.2, §4.2's `ConfigGet/Set`).

use super::CommandError;
use crate::output::{emit, OutputFormat};
use queuectl_core::{Config, ConfigKey, JobManager};

pub async fn show(format: OutputFormat, manager: &JobManager) -> Result<(), CommandError> {
    let config = manager.config_get().await?;
    emit(format, &config, |c: &Config| {
        println!("backoff_base={}", c.backoff_base);
        println!("default_priority={}", c.default_priority);
        println!("default_timeout={}", c.default_timeout);
        println!("max_retries={}", c.max_retries);
    });
    Ok(())
}

pub async fn set(format: OutputFormat, manager: &JobManager, key: &str, value: i64) -> Result<(), CommandError> {
    let key: ConfigKey = key.parse().map_err(CommandError::UserInput)?;
    manager.config_set(key, value).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({"key": key.as_str(), "value": value})),
        OutputFormat::Text => println!("{key}={value}"),
    }
    Ok(())
}
