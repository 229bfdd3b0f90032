//! Process-wide configuration scalars persisted in the Store (§3.2).

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The four named options QueueCTL persists and reads through on every
/// enqueue and retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    BackoffBase,
    DefaultPriority,
    DefaultTimeout,
    MaxRetries,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::BackoffBase,
        ConfigKey::DefaultPriority,
        ConfigKey::DefaultTimeout,
        ConfigKey::MaxRetries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::BackoffBase => "backoff_base",
            ConfigKey::DefaultPriority => "default_priority",
            ConfigKey::DefaultTimeout => "default_timeout",
            ConfigKey::MaxRetries => "max_retries",
        }
    }

    /// The default value of this key, per §3.2.
    pub fn default_value(&self) -> i64 {
        match self {
            ConfigKey::BackoffBase => 2,
            ConfigKey::DefaultPriority => 0,
            ConfigKey::DefaultTimeout => 300,
            ConfigKey::MaxRetries => 3,
        }
    }

    /// Validates a candidate value for this key's range, per §3.2.
    pub fn validate(&self, value: i64) -> Result<(), String> {
        match self {
            ConfigKey::BackoffBase if value < 2 => {
                Err("backoff_base must be >= 2".to_string())
            }
            ConfigKey::DefaultTimeout if value < 1 => {
                Err("default_timeout must be >= 1".to_string())
            }
            ConfigKey::MaxRetries if value < 0 => {
                Err("max_retries must be >= 0".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backoff_base" => Ok(ConfigKey::BackoffBase),
            "default_priority" => Ok(ConfigKey::DefaultPriority),
            "default_timeout" => Ok(ConfigKey::DefaultTimeout),
            "max_retries" => Ok(ConfigKey::MaxRetries),
            other => Err(format!("unknown config key '{other}'")),
        }
    }
}

/// A resolved snapshot of all config values, read through from the Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Config {
    pub backoff_base: i64,
    pub default_priority: i64,
    pub default_timeout: i64,
    pub max_retries: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backoff_base: ConfigKey::BackoffBase.default_value(),
            default_priority: ConfigKey::DefaultPriority.default_value(),
            default_timeout: ConfigKey::DefaultTimeout.default_value(),
            max_retries: ConfigKey::MaxRetries.default_value(),
        }
    }
}

impl Config {
    pub fn get(&self, key: ConfigKey) -> i64 {
        match key {
            ConfigKey::BackoffBase => self.backoff_base,
            ConfigKey::DefaultPriority => self.default_priority,
            ConfigKey::DefaultTimeout => self.default_timeout,
            ConfigKey::MaxRetries => self.max_retries,
        }
    }

    pub fn set(&mut self, key: ConfigKey, value: i64) {
        match key {
            ConfigKey::BackoffBase => self.backoff_base = value,
            ConfigKey::DefaultPriority => self.default_priority = value,
            ConfigKey::DefaultTimeout => self.default_timeout = value,
            ConfigKey::MaxRetries => self.max_retries = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.backoff_base, 2);
        assert_eq!(cfg.default_priority, 0);
        assert_eq!(cfg.default_timeout, 300);
        assert_eq!(cfg.max_retries, 3);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(ConfigKey::BackoffBase.validate(1).is_err());
        assert!(ConfigKey::BackoffBase.validate(2).is_ok());
        assert!(ConfigKey::DefaultTimeout.validate(0).is_err());
        assert!(ConfigKey::MaxRetries.validate(-1).is_err());
        assert!(ConfigKey::DefaultPriority.validate(-5).is_ok());
    }

    #[test]
    fn key_round_trips_through_str() {
        for key in ConfigKey::ALL {
            let parsed: ConfigKey = key.as_str().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }
}
