//! Identifier allow-list
//!
//! Every table, column, schema and database name is checked here before it
//! is spliced into DDL. Only ASCII letters, digits and `_` pass.

use super::errors::{IdentifierKind, ReconcileError, ReconcileResult};

/// Longest identifier accepted by any supported backend
pub const MAX_IDENTIFIER_LEN: usize = 64;

pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LEN
        && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

pub fn validate_identifier(kind: IdentifierKind, value: &str) -> ReconcileResult<()> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(ReconcileError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}
