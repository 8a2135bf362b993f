//! Crate-level error types.
//!
//! [`ConfigError`] covers the configuration file. Project parsing and
//! patching fail with [`KicadError`]. [`Error`] joins both for callers that
//! drive a whole swap, such as the CLI.

use std::path::PathBuf;

use thiserror::Error;

use crate::kicad::KicadError;

/// Result type for whole-swap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure while running a swap from configuration to written pages.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The swap could not be resolved or written.
    #[error(transparent)]
    Kicad(#[from] KicadError),

    /// The plan could not be rendered as JSON.
    #[error("failed to render swap plan as JSON")]
    Render(#[from] serde_json::Error),
}

/// Errors that can occur while loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    Read {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for [`crate::config::Config`].
    #[error("failed to parse configuration file: {path}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An explicitly named configuration file does not exist.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// A field holds a value the swap cannot work with.
    #[error("invalid configuration value for {field}: {message}")]
    Invalid {
        /// Dotted field path, e.g. `walk.max_depth`.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid field error.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_field_is_named() {
        let msg = ConfigError::invalid("walk.max_depth", "must be at least 1").to_string();
        assert!(msg.contains("walk.max_depth"));
        assert!(msg.contains("at least 1"));
    }

    #[test]
    fn swap_errors_pass_through_unchanged() {
        let err = Error::from(KicadError::ReferenceNotFound {
            reference: "U7".to_string(),
        });
        assert_eq!(err.to_string(), "Reference U7 not found on any schematic page");
    }

    #[test]
    fn config_errors_keep_their_path() {
        let err = Error::from(ConfigError::NotFound {
            path: PathBuf::from("/home/me/.kicad-unit-swap/config.json"),
        });
        assert!(matches!(err, Error::Config(ConfigError::NotFound { .. })));
        assert!(err.to_string().contains("config.json"));
    }
}
