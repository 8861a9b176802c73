//! Configuration validation logic
//!
//! This module provides validation methods for the configuration structures
//! to ensure configuration values are within acceptable ranges and formats.

use crate::config::error::ConfigError;
use crate::config::settings::{ComposerConfig, LoggerSettings};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl LoggerSettings {
    /// Validate logger settings
    ///
    /// # Validation Rules
    /// - Level must be one of trace, debug, info, warn, error
    /// - Format must be one of full, compact, json
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::validation(
                "logger.level".to_string(),
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        let format = self.format.to_lowercase();
        if !VALID_LOG_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::validation(
                "logger.format".to_string(),
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

impl ComposerConfig {
    /// Validate the whole configuration
    ///
    /// # Validation Rules
    /// - Body limit must be greater than 0
    /// - Logger settings must be valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.body_limit == 0 {
            return Err(ConfigError::validation(
                "body_limit",
                "Body limit must be greater than 0 bytes.",
            ));
        }

        self.logger.validate()
    }
}
