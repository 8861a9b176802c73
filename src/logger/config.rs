//! Configuration types for the logger

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::logger::error::LoggerError;

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Default level, or a full `EnvFilter` directive string
    pub level: String,
    pub format: LogFormat,
    /// ANSI colors; only honored when stdout is a terminal
    pub colored: bool,
}

impl LoggerConfig {
    pub fn new(
        level: impl Into<String>,
        format: LogFormat,
        colored: bool,
    ) -> Result<Self, LoggerError> {
        let config = Self {
            level: level.into(),
            format,
            colored,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoggerError> {
        self.parse_level().map(|_| ())
    }

    /// Parse the log level string into a tracing::Level
    pub fn parse_level(&self) -> Result<Level, LoggerError> {
        match self.level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => Err(LoggerError::config(format!(
                "Invalid log level '{}'. Valid levels are: trace, debug, info, warn, error",
                self.level
            ))),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            colored: true,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Full => "full",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(LogFormat::Full),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggerError::config(format!(
                "Invalid log format '{}'. Valid formats are: full, compact, json",
                s
            ))),
        }
    }
}
