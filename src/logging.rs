//! Structured logging with tracing

use std::path::Path;

use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{BrickError, Result};

/// Environment variable overriding the configured filter
pub const LOG_ENV: &str = "BRICK_LOG";

/// Install a global subscriber for the configured level.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    if installed.is_err() {
        debug!("global subscriber already installed");
        return Ok(());
    }

    info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(BrickError::InvalidArgument(format!(
            "invalid log level '{level}', use trace, debug, info, warn or error"
        ))),
    }
}

pub(crate) fn log_config_loaded(path: &Path, found: bool) {
    if found {
        info!("Configuration loaded from {}", path.display());
    } else {
        debug!("Configuration file not found: {}", path.display());
    }
}
