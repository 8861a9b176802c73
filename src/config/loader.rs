//! Configuration loader for fusion-routes
//!
//! This module provides the `ConfigLoader` struct that merges an optional
//! configuration file with environment variable overrides.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

use crate::config::error::ConfigError;
use crate::config::settings::ComposerConfig;

/// Environment variable naming a configuration file
const CONFIG_FILE_ENV: &str = "FUSION_ROUTES_CONFIG_FILE";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "FUSION_ROUTES";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Configuration loader
///
/// Sources, in order of priority:
/// 1. Built-in defaults
/// 2. The configuration file, when one is set (TOML)
/// 3. `FUSION_ROUTES_*` environment variables (highest priority)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that reads the file named by `FUSION_ROUTES_CONFIG_FILE`, if set.
    pub fn new() -> Self {
        Self {
            config_file: std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from),
        }
    }

    /// Create a loader for an explicit configuration file.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_file: Some(path.into()),
        }
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configured file does not exist
    /// - Configuration parsing fails
    /// - Configuration validation fails
    pub fn load(&self) -> Result<ComposerConfig, ConfigError> {
        let config = self.build_config()?;
        let settings: ComposerConfig = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
        })?;

        settings.validate()?;

        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = Config::builder();

        let builder = match self.config_file {
            Some(ref path) => Self::add_file_source(builder, path)?,
            None => builder,
        };

        // FUSION_ROUTES_LOGGER__LEVEL -> logger.level
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        );

        builder.build().map_err(ConfigError::from)
    }

    fn add_file_source(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(true)))
    }
}
