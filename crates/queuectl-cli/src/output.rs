//! Output format shared by every subcommand (§6.1).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("invalid format '{other}', use 'text' or 'json'")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Prints `value` as pretty JSON under `json`, or via `render` under `text`.
pub fn emit<T: serde::Serialize>(format: OutputFormat, value: &T, render: impl FnOnce(&T)) {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
        OutputFormat::Text => render(value),
    }
}
