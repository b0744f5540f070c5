//! Configuration parsing and management.
//!
//! A ledger deployment is described by one TOML document:
//!
//! ```toml
//! [store]
//! path = "biochar.db"
//! busy_timeout_ms = 5000
//! wal = true
//!
//! [log]
//! level = "info"
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    /// Store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Log configuration.
    #[serde(default)]
    pub log: LogConfig,
}

impl LedgerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails [`Self::validate`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a zero busy timeout, an empty
    /// store path or an empty log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "store.path must not be empty".to_string(),
            ));
        }
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "store.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "log.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How long a writer waits for the database write lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Use the write-ahead log journal.
    #[serde(default = "default_wal")]
    pub wal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            wal: default_wal(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("biochar.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_wal() -> bool {
    true
}

/// Log configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
