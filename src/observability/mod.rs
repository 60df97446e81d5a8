//! # Observability
//!
//! Process-wide `tracing` subscriber. Output is one JSON object per line by
//! default, or human-readable text for local runs, written to stderr.
//! `RUST_LOG` overrides the configured level.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter {filter:?}: {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Parse filter directives such as `info` or `realtimer=debug,sqlx=warn`
pub fn filter_from(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives.to_string(),
        message: e.to_string(),
    })
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| config.level.clone());
    let filter = filter_from(&directives)?;

    let registry = Registry::default().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_level_and_targets() {
        assert!(filter_from("info").is_ok());
        assert!(filter_from("realtimer=debug,sqlx=warn").is_ok());
    }

    #[test]
    fn test_rejects_unknown_level() {
        let err = filter_from("realtimer=loud").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
    }
}
