//! Ledger configuration.
//!
//! Configuration is read from an optional JSON file and then overridden by
//! environment variables, mirroring how the CLI tooling resolves settings:
//!
//! ```json
//! { "hold_period_secs": 10800 }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default hold period: three hours.
pub const DEFAULT_HOLD_PERIOD_SECS: u64 = 3 * 60 * 60;

/// Environment variable overriding [`LedgerConfig::hold_period_secs`].
pub const HOLD_PERIOD_ENV: &str = "STAKEPOST_HOLD_PERIOD_SECS";

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    /// The config file exists but could not be read.
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    /// The config file is not valid JSON for [`LedgerConfig`].
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {name}: {value}")]
    /// An environment override could not be parsed.
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Tunable ledger parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Minimum time a stake stays locked before it may exit.
    pub hold_period_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            hold_period_secs: DEFAULT_HOLD_PERIOD_SECS,
        }
    }
}

impl LedgerConfig {
    /// Loads from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Applies overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(HOLD_PERIOD_ENV).filter(|v| !v.trim().is_empty()) {
            self.hold_period_secs =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: HOLD_PERIOD_ENV,
                        value,
                    })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("{name}_{nanos}.json"));
        p
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = LedgerConfig::load(&temp_path("absent_config")).unwrap();
        assert_eq!(config.hold_period_secs, DEFAULT_HOLD_PERIOD_SECS);
    }

    #[test]
    fn file_values_and_env_override() {
        let path = temp_path("ledger_config");
        fs::write(&path, "{\"hold_period_secs\": 60}").unwrap();
        let config = LedgerConfig::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.hold_period_secs, 60);

        let overridden = config
            .with_overrides(|name| (name == HOLD_PERIOD_ENV).then(|| "120".to_string()))
            .unwrap();
        assert_eq!(overridden.hold_period_secs, 120);
    }

    #[test]
    fn empty_object_uses_defaults() {
        let config: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn bad_override_is_reported() {
        let err = LedgerConfig::default()
            .with_overrides(|_| Some("soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name, .. } if name == HOLD_PERIOD_ENV));
    }
}
