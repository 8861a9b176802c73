//! Configuration management module for fusion-routes
//!
//! This module provides configuration loading with support for:
//! - An optional TOML configuration file
//! - Environment variable overrides
//!
//! # Configuration Priority (lowest to highest)
//! 1. Built-in defaults
//! 2. The file named by `FUSION_ROUTES_CONFIG_FILE` (or passed to [`ConfigLoader::with_file`])
//! 3. `FUSION_ROUTES_*` environment variables

pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

// Re-export public types
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{ComposerConfig, LoggerSettings, ValidationSettings};
