//! Configuration settings structures for fusion-routes
//!
//! This module defines the configuration structures that can be loaded from
//! TOML files and environment variables.

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_body_limit() -> usize {
    2 * 1024 * 1024 // 2MB
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "full".to_string()
}

// ============================================================================
// Settings
// ============================================================================

/// Root configuration for composed routes.
///
/// # Example (TOML)
/// ```toml
/// body_limit = 1048576
///
/// [validation]
/// convert = true
///
/// [logger]
/// level = "debug"
/// format = "json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Maximum accepted request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,

    #[serde(default)]
    pub validation: ValidationSettings,

    #[serde(default)]
    pub logger: LoggerSettings,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            body_limit: default_body_limit(),
            validation: ValidationSettings::default(),
            logger: LoggerSettings::default(),
        }
    }
}

/// Request validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Convert numeric and boolean strings when a schema expects those types
    #[serde(default = "default_true")]
    pub convert: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            convert: default_true(),
        }
    }
}

/// Logger settings as they appear in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// One of `full`, `compact`, `json`
    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colored: default_true(),
        }
    }
}

impl LoggerSettings {
    /// Converts the raw settings into a [`LoggerConfig`].
    pub fn to_logger_config(&self) -> Result<LoggerConfig, ConfigError> {
        self.validate()?;
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.format".to_string(), e.to_string()))?;
        Ok(LoggerConfig {
            level: self.level.clone(),
            format,
            colored: self.colored,
        })
    }
}
