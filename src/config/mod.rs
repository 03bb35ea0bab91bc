//! Startup configuration.
//!
//! The config file is looked up in this order:
//!
//! 1. the positional path on the command line, which must exist
//! 2. `~/.bim-bridge/config.json` (`%USERPROFILE%\.bim-bridge\config.json`
//!    on Windows), used only if present
//!
//! With neither, the built-in defaults apply. See
//! `config/example-config.json` for every field.

mod settings;

pub use settings::{Config, LogLevel, LoggingConfig, QueryConfig, TransactionConfig};

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::model::Document;

/// Title of the document served when no model is configured.
pub const EMPTY_MODEL_TITLE: &str = "Untitled";

/// Per-user config directory, `~/.bim-bridge`.
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bim-bridge"))
}

/// Per-user config file, `~/.bim-bridge/config.json`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join("config.json"))
}

/// Resolves, reads and validates the config.
///
/// # Errors
///
/// Returns an error if an explicit `path` does not exist, or if the chosen
/// file cannot be read, does not parse, or fails [`Config::validate`].
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = resolve(path)? else {
        debug!("No config file, using defaults");
        return Ok(Config::default());
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
        path: path.clone(),
        source,
    })?;
    let config: Config = serde_json::from_str(&text)
        .map_err(|source| ConfigError::Malformed { path: path.clone(), source })?;
    config.validate()?;

    debug!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// The file to read, or `None` to use defaults.
fn resolve(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match explicit {
        Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
        Some(path) => Err(ConfigError::Missing {
            path: path.to_path_buf(),
        }),
        None => Ok(default_config_path().filter(|p| p.exists())),
    }
}

/// Opens the model snapshot at `path`, or an empty document when no path is
/// configured.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read or parsed.
pub fn open_model(path: Option<&Path>) -> Result<Document, ConfigError> {
    let Some(path) = path else {
        return Ok(Document::new(EMPTY_MODEL_TITLE));
    };
    Document::open(path).map_err(|source| ConfigError::ModelUnavailable {
        path: path.to_path_buf(),
        source,
    })
}
