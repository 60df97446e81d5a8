//! # Change Events
//!
//! Row-level change events relayed from database triggers to subscribers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::RealtimeError;

/// Row operation a trigger fires on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// New row inserted
    #[serde(alias = "insert")]
    Insert,
    /// Existing row updated
    #[serde(alias = "update")]
    Update,
    /// Row deleted
    #[serde(alias = "delete")]
    Delete,
}

impl Operation {
    /// All operations, in trigger-creation order
    pub const ALL: [Operation; 3] = [Operation::Insert, Operation::Update, Operation::Delete];

    /// SQL keyword form (`INSERT`)
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    /// Lowercase form used in topics and trigger names (`insert`)
    pub fn as_lower(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Row image the trigger body reads (`NEW` or `OLD`)
    pub fn row_image(&self) -> &'static str {
        match self {
            Operation::Insert | Operation::Update => "NEW",
            Operation::Delete => "OLD",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operation {
    type Err = RealtimeError;

    /// Parses an operation case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            _ => Err(RealtimeError::InvalidOperation(s.to_string())),
        }
    }
}

/// Column name to value-as-text mapping of one row.
///
/// Ordered so that the serialized form is deterministic.
pub type Columns = BTreeMap<String, String>;

/// A change to one row, as posted by a database trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the row belongs to
    pub table: String,

    /// Operation that produced the change
    pub operation: Operation,

    /// Row contents
    pub columns: Columns,
}

impl ChangeEvent {
    /// Create a new change event
    pub fn new(table: impl Into<String>, operation: Operation, columns: Columns) -> Self {
        Self {
            table: table.into(),
            operation,
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Insert.to_string(), "INSERT");
        assert_eq!(Operation::Update.to_string(), "UPDATE");
        assert_eq!(Operation::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_operation_parse_is_case_insensitive() {
        assert_eq!("INSERT".parse::<Operation>().unwrap(), Operation::Insert);
        assert_eq!("update".parse::<Operation>().unwrap(), Operation::Update);
        assert_eq!("Delete".parse::<Operation>().unwrap(), Operation::Delete);
    }

    #[test]
    fn test_operation_parse_rejects_unknown() {
        let err = "TRUNCATE".parse::<Operation>().unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidOperation(op) if op == "TRUNCATE"));
    }

    #[test]
    fn test_row_image() {
        assert_eq!(Operation::Insert.row_image(), "NEW");
        assert_eq!(Operation::Update.row_image(), "NEW");
        assert_eq!(Operation::Delete.row_image(), "OLD");
    }

    #[test]
    fn test_operation_deserialize_accepts_both_cases() {
        let ops: Vec<Operation> = serde_json::from_str(r#"["INSERT", "delete"]"#).unwrap();
        assert_eq!(ops, vec![Operation::Insert, Operation::Delete]);
    }
}
