//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::kicad::{OutputMode, OutputOptions, SheetWalker};

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Symbol cache library, overriding `<project>-cache.lib`.
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Variables overlaid on the process environment for `${VAR}` sheet paths.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Sheet hierarchy settings.
    #[serde(default)]
    pub walk: WalkConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.walk.max_depth == 0 {
            return Err(ConfigError::invalid("walk.max_depth", "must be at least 1"));
        }
        if self.output.mode == OutputModeSetting::Sibling && self.output.suffix.is_empty() {
            return Err(ConfigError::invalid(
                "output.suffix",
                "must not be empty in sibling mode",
            ));
        }
        if self.environment.keys().any(String::is_empty) {
            return Err(ConfigError::invalid(
                "environment",
                "variable names must not be empty",
            ));
        }
        Ok(())
    }

    /// Commit options described by the `output` section.
    #[must_use]
    pub fn output_options(&self) -> OutputOptions {
        let mode = match self.output.mode {
            OutputModeSetting::InPlace => OutputMode::InPlace,
            OutputModeSetting::Sibling => OutputMode::Sibling {
                suffix: self.output.suffix.clone(),
            },
        };
        OutputOptions {
            mode,
            backup: self.output.backup,
        }
    }
}

/// Sheet hierarchy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkConfig {
    /// Maximum number of sheet levels below the root page.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

const fn default_max_depth() -> usize {
    SheetWalker::DEFAULT_MAX_DEPTH
}

/// How patched pages are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputModeSetting {
    /// Overwrite the original pages.
    #[default]
    InPlace,
    /// Write next to the original pages with a suffix.
    Sibling,
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// "in_place" or "sibling".
    #[serde(default)]
    pub mode: OutputModeSetting,

    /// File name suffix for sibling mode.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Keep a timestamped backup before overwriting a page.
    #[serde(default = "default_true")]
    pub backup: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputModeSetting::default(),
            suffix: default_suffix(),
            backup: default_true(),
        }
    }
}

fn default_suffix() -> String {
    "_alt".to_string()
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_options(), OutputOptions::default());
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "library_path": "/path/to/project-cache.lib",
            "environment": {
                "KIPRJMOD": "/path/to/project"
            },
            "walk": {
                "max_depth": 8
            },
            "output": {
                "mode": "sibling",
                "suffix": ".swapped",
                "backup": false
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.library_path,
            Some(PathBuf::from("/path/to/project-cache.lib"))
        );
        assert_eq!(
            config.environment.get("KIPRJMOD").map(String::as_str),
            Some("/path/to/project")
        );
        assert_eq!(config.walk.max_depth, 8);
        assert_eq!(
            config.output_options(),
            OutputOptions {
                mode: OutputMode::Sibling {
                    suffix: ".swapped".to_string()
                },
                backup: false,
            }
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn walk_config_defaults() {
        assert_eq!(WalkConfig::default().max_depth, 64);
    }

    #[test]
    fn output_config_defaults() {
        let config = OutputConfig::default();
        assert_eq!(config.mode, OutputModeSetting::InPlace);
        assert_eq!(config.suffix, "_alt");
        assert!(config.backup);
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_zero_depth() {
        let json = r#"{ "walk": { "max_depth": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "walk.max_depth", .. })
        ));
    }

    #[test]
    fn reject_empty_sibling_suffix() {
        let json = r#"{ "output": { "mode": "sibling", "suffix": "" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
