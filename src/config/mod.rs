//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path specified via `--config` CLI flag
//! 2. Default location:
//!    - **Linux/macOS:** `~/.kicad-unit-swap/config.json`
//!    - **Windows:** `%USERPROFILE%\.kicad-unit-swap\config.json`
//!
//! Without either, built-in defaults are used.

mod settings;

pub use settings::{Config, LoggingConfig, OutputConfig, OutputModeSetting, WalkConfig};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.kicad-unit-swap/`
/// - **Windows:** `%USERPROFILE%\.kicad-unit-swap\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".kicad-unit-swap"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, uses the platform-specific default location.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Required fields are missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path().ok_or_else(|| ConfigError::NotFound {
            path: PathBuf::from("<default config path>"),
        })?,
    };

    if !config_path.exists() {
        return Err(ConfigError::NotFound { path: config_path });
    }

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: config_path.clone(),
        source: e,
    })?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

/// Loads the configuration, falling back to defaults when no file is given
/// and none exists at the default location.
///
/// # Errors
///
/// Returns an error if an explicit `path` is missing, or if the file found
/// cannot be read, parsed or validated.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    if path.is_some() {
        return load_config(path);
    }
    match default_config_path() {
        Some(default) if default.exists() => load_config(Some(&default)),
        _ => Ok(Config::default()),
    }
}
