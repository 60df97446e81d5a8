//! CLI-specific error types
//!
//! Every CLI error is fatal: printed to stderr, exit code 1.

use std::fmt;
use std::io;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::observability::LoggingError;
use crate::reconcile::ReconcileError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Boot failed
    BootFailed,
    /// Trigger reconciliation failed
    ReconcileFailed,
    /// Token could not be issued
    TokenFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "REALTIMER_CLI_CONFIG_ERROR",
            Self::IoError => "REALTIMER_CLI_IO_ERROR",
            Self::BootFailed => "REALTIMER_CLI_BOOT_FAILED",
            Self::ReconcileFailed => "REALTIMER_CLI_RECONCILE_FAILED",
            Self::TokenFailed => "REALTIMER_CLI_TOKEN_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    pub fn reconcile_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ReconcileFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        Self::boot_failed(e.to_string())
    }
}

impl From<ReconcileError> for CliError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Configuration(_) | ReconcileError::InvalidIdentifier { .. } => {
                Self::config_error(e.to_string())
            }
            _ => Self::reconcile_failed(e.to_string()),
        }
    }
}

impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        Self::new(CliErrorCode::TokenFailed, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::boot_failed("port in use");
        assert_eq!(err.to_string(), "REALTIMER_CLI_BOOT_FAILED: port in use");
    }

    #[test]
    fn test_reconcile_configuration_maps_to_config_error() {
        let err: CliError = ReconcileError::Configuration("bad table".into()).into();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);

        let err: CliError = ReconcileError::catalog("listing triggers", "refused").into();
        assert_eq!(err.code(), &CliErrorCode::ReconcileFailed);
    }
}
