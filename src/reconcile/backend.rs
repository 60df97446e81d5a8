//! Trigger backend abstraction
//!
//! A backend can read the trigger and column catalogs of one database and
//! create or drop a single trigger at a time. The reconciler only talks to
//! this trait.

use async_trait::async_trait;

use super::errors::{ReconcileError, ReconcileResult};
use super::identifier::MAX_IDENTIFIER_LEN;
use super::naming::TriggerDescriptor;
use crate::realtime::event::Operation;

/// Path the generated triggers post rows to
pub const INGEST_PATH: &str = "/api/db";

/// A trigger found in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExistingTrigger {
    pub name: String,
    pub table: String,
}

impl ExistingTrigger {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
        }
    }
}

/// Where generated triggers send their rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalloutTarget {
    base_url: String,
}

impl CalloutTarget {
    /// Accepts an `http(s)://` base URL made of plain URL characters.
    ///
    /// The URL ends up inside a SQL string literal, so quotes, backslashes,
    /// `$`, `;` and whitespace are refused outright.
    pub fn new(base_url: &str) -> ReconcileResult<Self> {
        let base_url = base_url.trim_end_matches('/');

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ReconcileError::Configuration(format!(
                "callout base URL must start with http:// or https://, got {:?}",
                base_url
            )));
        }

        let unsafe_char = base_url
            .chars()
            .find(|c| !c.is_ascii_graphic() || matches!(c, '\'' | '"' | '\\' | '`' | '$' | ';'));
        if let Some(c) = unsafe_char {
            return Err(ReconcileError::Configuration(format!(
                "callout base URL contains unsupported character {:?}",
                c
            )));
        }

        Ok(Self {
            base_url: base_url.to_string(),
        })
    }

    /// Full ingestion URL for one table and operation
    pub fn url_for(&self, table: &str, operation: Operation) -> String {
        format!(
            "{}{}?table={}&event={}",
            self.base_url,
            INGEST_PATH,
            table,
            operation.as_sql()
        )
    }
}

/// Database-specific trigger management
#[async_trait]
pub trait TriggerBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Longest trigger name the database keeps without truncating
    fn max_identifier_len(&self) -> usize {
        MAX_IDENTIFIER_LEN
    }

    /// Check that the HTTP callout facility exists in the database
    async fn verify_callout(&self) -> ReconcileResult<()> {
        Ok(())
    }

    /// Triggers in the managed schema whose names carry the managed prefix
    async fn list_existing_triggers(&self) -> ReconcileResult<Vec<ExistingTrigger>>;

    /// Column names of a table in ordinal order; empty if the table is missing
    async fn list_columns(&self, table: &str) -> ReconcileResult<Vec<String>>;

    async fn create_trigger(
        &self,
        trigger: &TriggerDescriptor,
        columns: &[String],
    ) -> ReconcileResult<()>;

    async fn drop_trigger(&self, trigger: &ExistingTrigger) -> ReconcileResult<()>;
}
