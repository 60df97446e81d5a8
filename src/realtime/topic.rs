//! # Topics
//!
//! Routing keys shared by the ingestion side and the subscribe side.
//! A topic serializes as `<operation>:<table>` with the operation lowercased.

use std::fmt;
use std::str::FromStr;

use super::errors::{RealtimeError, RealtimeResult};
use super::event::Operation;

/// Broker routing key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    operation: Operation,
    table: String,
}

impl Topic {
    /// Create a topic for an operation on a table
    pub fn new(operation: Operation, table: impl Into<String>) -> Self {
        Self {
            operation,
            table: table.into(),
        }
    }

    /// Build a topic from raw request parameters.
    ///
    /// Both values are required; the operation is matched case-insensitively.
    pub fn from_params(operation: Option<&str>, table: Option<&str>) -> RealtimeResult<Self> {
        let operation = non_empty(operation).ok_or(RealtimeError::MissingParameter("event"))?;
        let table = non_empty(table).ok_or(RealtimeError::MissingParameter("table"))?;

        Ok(Self::new(operation.parse()?, table))
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Broker key form (`insert:orders`)
    pub fn key(&self) -> String {
        self.to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation.as_lower(), self.table)
    }
}

impl FromStr for Topic {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (operation, table) = s
            .split_once(':')
            .ok_or_else(|| RealtimeError::InvalidTopic(s.to_string()))?;

        if table.is_empty() || operation != operation.to_ascii_lowercase() {
            return Err(RealtimeError::InvalidTopic(s.to_string()));
        }

        let operation = operation
            .parse()
            .map_err(|_| RealtimeError::InvalidTopic(s.to_string()))?;

        Ok(Self::new(operation, table))
    }
}
