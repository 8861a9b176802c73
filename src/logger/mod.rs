//! Logger module
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and one
//! console layer in Full, Compact or JSON format.

pub mod config;
pub mod error;

pub use self::config::{LogFormat, LoggerConfig};
pub use error::LoggerError;

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global logger with the given configuration.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. Fails if a
/// global subscriber is already installed.
pub fn init_logger(config: &LoggerConfig) -> Result<(), LoggerError> {
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let use_ansi = config.colored && std::io::stdout().is_terminal();
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Full => registry
            .with(fmt::layer().with_ansi(use_ansi).with_target(true).with_level(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_ansi(use_ansi)
                    .with_target(true)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_ansi(false).json())
            .try_init(),
    };

    result.map_err(|e| LoggerError::init(e.to_string()))
}
