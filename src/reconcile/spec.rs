//! Desired trigger configuration

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::errors::{IdentifierKind, ReconcileError, ReconcileResult};
use super::identifier::validate_identifier;
use super::naming::TriggerDescriptor;
use crate::realtime::event::Operation;

/// One watched table and the operations to relay for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,

    /// Duplicates in the input collapse here
    pub operations: BTreeSet<Operation>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, operations: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            name: name.into(),
            operations: operations.into_iter().collect(),
        }
    }
}

/// Validated set of (table, operation) pairs that should have triggers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredSpec {
    tables: Vec<TableSpec>,
}

impl DesiredSpec {
    /// Validate table names and operation lists.
    ///
    /// Fails on the first invalid identifier, repeated table or table
    /// without operations.
    pub fn new(tables: Vec<TableSpec>) -> ReconcileResult<Self> {
        let mut seen = HashSet::new();

        for table in &tables {
            validate_identifier(IdentifierKind::Table, &table.name)?;

            if !seen.insert(table.name.as_str()) {
                return Err(ReconcileError::Configuration(format!(
                    "table `{}` is declared more than once",
                    table.name
                )));
            }

            if table.operations.is_empty() {
                return Err(ReconcileError::Configuration(format!(
                    "table `{}` declares no operations",
                    table.name
                )));
            }
        }

        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn contains(&self, table: &str, operation: Operation) -> bool {
        self.tables
            .iter()
            .any(|t| t.name == table && t.operations.contains(&operation))
    }

    /// Every desired trigger, in declaration order
    pub fn descriptors(&self) -> impl Iterator<Item = TriggerDescriptor> + '_ {
        self.tables.iter().flat_map(|table| {
            table
                .operations
                .iter()
                .map(move |op| TriggerDescriptor::new(table.name.clone(), *op))
        })
    }
}
