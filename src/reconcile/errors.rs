//! Reconciliation error types

use serde::Serialize;
use thiserror::Error;

use super::reconciler::ReconcileReport;
use crate::realtime::event::Operation;

/// Result type for reconciliation
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// What kind of identifier was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Table,
    Column,
    Schema,
    Database,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
            IdentifierKind::Schema => "schema",
            IdentifierKind::Database => "database",
        };
        f.write_str(name)
    }
}

/// The step a failed trigger change was attempting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Drop,
}

/// One create or drop that did not succeed during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerSyncFailure {
    pub action: SyncAction,
    pub table: String,
    pub operation: Operation,
    pub canonical_name: String,
    pub message: String,
}

impl std::fmt::Display for TriggerSyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self.action {
            SyncAction::Create => "create",
            SyncAction::Drop => "drop",
        };
        write!(
            f,
            "{} {} ({} on {}): {}",
            action, self.canonical_name, self.operation, self.table, self.message
        )
    }
}

/// Reconciliation errors
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The desired configuration is unusable; nothing was executed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A name failed the identifier allow-list; nothing was executed
    #[error("Invalid {kind} identifier: {value:?}")]
    InvalidIdentifier { kind: IdentifierKind, value: String },

    /// The trigger or column catalog could not be read
    #[error("Catalog error while {context}: {message}")]
    Catalog { context: String, message: String },

    /// A single DDL statement failed
    #[error("Statement failed: {0}")]
    Statement(String),

    /// The pass completed but some trigger changes failed
    #[error("{} trigger change(s) failed", .0.failures.len())]
    TriggerSync(ReconcileReport),
}

impl ReconcileError {
    pub fn catalog(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ReconcileError::Catalog {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn statement(err: impl std::fmt::Display) -> Self {
        ReconcileError::Statement(err.to_string())
    }

    /// Whether startup must stop on this error.
    ///
    /// Partial trigger failures are not fatal; a pass where nothing
    /// succeeded is.
    pub fn is_fatal(&self) -> bool {
        match self {
            ReconcileError::TriggerSync(report) => report.is_total_failure(),
            _ => true,
        }
    }

    /// The partial report, when the pass ran to completion
    pub fn report(&self) -> Option<&ReconcileReport> {
        match self {
            ReconcileError::TriggerSync(report) => Some(report),
            _ => None,
        }
    }
}
