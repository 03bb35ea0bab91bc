//! Startup error types.
//!
//! Everything that can stop the bridge before it serves its first request:
//! the config file and the model snapshot it points at. Per-request
//! failures are [`crate::engine::EngineError`].

use std::path::PathBuf;

use thiserror::Error;

use crate::model::ModelError;

/// Errors raised while loading configuration or opening the model.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly named config file does not exist.
    #[error("no config file at {path}")]
    Missing {
        /// The path given on the command line.
        path: PathBuf,
    },

    /// The config file exists but could not be read.
    #[error("cannot read config file {path}")]
    Unreadable {
        /// Config file path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`crate::config::Config`].
    #[error("malformed config file {path}")]
    Malformed {
        /// Config file path.
        path: PathBuf,
        /// Deserialisation failure, with line and column.
        #[source]
        source: serde_json::Error,
    },

    /// A setting parsed but has an unusable value.
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// Dotted key, e.g. `query.point_tolerance`.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },

    /// The configured model snapshot could not be opened.
    #[error("cannot open model snapshot {path}")]
    ModelUnavailable {
        /// Snapshot path from `--model` or `model_path`.
        path: PathBuf,
        /// What the loader reported.
        #[source]
        source: ModelError,
    },
}
