//! Shape of the JSON config file.
//!
//! Every section is optional. A missing section or field takes the value from
//! the section's `Default` impl, so `{}` is a complete config.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::Level;

use crate::engine::{QueryOptions, DEFAULT_DUPLICATE_TOLERANCE, DEFAULT_POINT_TOLERANCE};
use crate::error::ConfigError;

/// The whole config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Editor schema hint, ignored.
    #[serde(rename = "$schema")]
    _schema: Option<String>,

    /// Free-form note, ignored.
    #[serde(rename = "_comment")]
    _comment: Option<String>,

    /// JSON model snapshot to serve. `None` serves an empty model.
    pub model_path: Option<PathBuf>,

    /// Directories exports may write into. Empty means the current
    /// directory.
    pub allowed_paths: Vec<PathBuf>,

    /// Query tunables.
    pub query: QueryConfig,

    /// Transaction behaviour.
    pub transactions: TransactionConfig,

    /// Log output.
    pub logging: LoggingConfig,
}

impl Config {
    /// Export directories with the current-directory fallback applied.
    #[must_use]
    pub fn export_dirs(&self) -> Vec<PathBuf> {
        if self.allowed_paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.allowed_paths.clone()
        }
    }

    /// Checks values that deserialise but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] for a tolerance that is not a
    /// positive finite number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("query.point_tolerance", self.query.point_tolerance)?;
        positive("query.duplicate_tolerance", self.query.duplicate_tolerance)
    }
}

fn positive(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSetting {
            key,
            reason: format!("expected a positive number, got {value}"),
        })
    }
}

/// `query` section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Half-width of point probes when a request gives no tolerance.
    pub point_tolerance: f64,
    /// Distance under which two locations count as duplicates.
    pub duplicate_tolerance: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            point_tolerance: DEFAULT_POINT_TOLERANCE,
            duplicate_tolerance: DEFAULT_DUPLICATE_TOLERANCE,
        }
    }
}

impl From<QueryConfig> for QueryOptions {
    fn from(config: QueryConfig) -> Self {
        Self {
            point_tolerance: config.point_tolerance,
            duplicate_tolerance: config.duplicate_tolerance,
        }
    }
}

/// `transactions` section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransactionConfig {
    /// Run reads inside an immediately committed transaction.
    pub wrap_reads: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self { wrap_reads: true }
    }
}

/// Verbosity accepted in `logging.level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything.
    #[serde(alias = "TRACE")]
    Trace,
    /// Evaluation counts and dispatch decisions.
    #[serde(alias = "DEBUG")]
    Debug,
    /// Committed mutations and lifecycle.
    #[serde(alias = "INFO")]
    Info,
    /// Rollbacks and partial failures.
    #[default]
    #[serde(alias = "WARN")]
    Warn,
    /// Errors only.
    #[serde(alias = "ERROR")]
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// `logging` section.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level used when the command line gives no `-v` or `-q`.
    pub level: LogLevel,
}
