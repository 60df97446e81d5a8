//! # Trigger Reconciliation
//!
//! Keeps one row-level trigger per watched (table, operation) pair in the
//! source database and removes managed triggers nobody asks for anymore.
//!
//! ## Invariants
//!
//! - Managed triggers are named `realtimer_trigger_<op>_<table>`
//! - Only canonical, prefixed triggers are ever dropped
//! - Every identifier passes the allow-list before it reaches DDL
//! - One failed trigger change never aborts the rest of the pass

pub mod backend;
pub mod errors;
pub mod identifier;
pub mod mysql;
pub mod naming;
pub mod postgres;
pub mod reconciler;
pub mod spec;

use std::sync::Arc;

pub use backend::{CalloutTarget, ExistingTrigger, TriggerBackend, INGEST_PATH};
pub use errors::{
    IdentifierKind, ReconcileError, ReconcileResult, SyncAction, TriggerSyncFailure,
};
pub use identifier::{is_valid_identifier, validate_identifier};
pub use mysql::MySqlBackend;
pub use naming::{parse_trigger_name, trigger_name, TriggerDescriptor, TRIGGER_PREFIX};
pub use postgres::PostgresBackend;
pub use reconciler::{ReconcileReport, Reconciler};
pub use spec::{DesiredSpec, TableSpec};

use crate::config::{DatabaseConfig, DatabaseKind};

/// Connect the backend matching the configured database kind
pub async fn connect_backend(
    config: &DatabaseConfig,
    callout: CalloutTarget,
) -> ReconcileResult<Arc<dyn TriggerBackend>> {
    let backend: Arc<dyn TriggerBackend> = match config.kind {
        DatabaseKind::Postgres => Arc::new(PostgresBackend::connect(config, callout).await?),
        DatabaseKind::Mysql => Arc::new(MySqlBackend::connect(config, callout).await?),
    };
    Ok(backend)
}
