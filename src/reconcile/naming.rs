//! Canonical trigger names
//!
//! A managed trigger is named `realtimer_trigger_<operation>_<table>` with
//! the operation lowercased. The full name is the lookup key when comparing
//! against the catalog.

use crate::realtime::event::Operation;

/// Prefix shared by every trigger this service manages
pub const TRIGGER_PREFIX: &str = "realtimer_trigger_";

pub fn trigger_name(operation: Operation, table: &str) -> String {
    format!("{}{}_{}", TRIGGER_PREFIX, operation.as_lower(), table)
}

/// Split a canonical name into its operation and table.
///
/// Returns `None` for anything that does not carry the prefix, a lowercase
/// operation and a non-empty table.
pub fn parse_trigger_name(name: &str) -> Option<(Operation, &str)> {
    let rest = name.strip_prefix(TRIGGER_PREFIX)?;
    let (operation, table) = rest.split_once('_')?;
    if table.is_empty() {
        return None;
    }

    let operation = Operation::ALL
        .into_iter()
        .find(|op| op.as_lower() == operation)?;
    Some((operation, table))
}

/// Whether `name` is exactly the canonical name for a trigger on `table`
pub fn is_canonical_for(name: &str, table: &str) -> Option<Operation> {
    let (operation, parsed_table) = parse_trigger_name(name)?;
    (parsed_table == table).then_some(operation)
}

/// `LIKE` pattern matching the prefix, with `_` escaped
pub fn prefix_like_pattern() -> String {
    format!("{}%", TRIGGER_PREFIX.replace('_', "\\_"))
}

/// A trigger the desired configuration calls for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDescriptor {
    pub table: String,
    pub operation: Operation,
    pub canonical_name: String,
}

impl TriggerDescriptor {
    pub fn new(table: impl Into<String>, operation: Operation) -> Self {
        let table = table.into();
        let canonical_name = trigger_name(operation, &table);
        Self {
            table,
            operation,
            canonical_name,
        }
    }
}
