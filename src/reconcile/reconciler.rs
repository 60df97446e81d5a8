//! # Trigger Reconciler
//!
//! Brings the managed triggers of one database in line with a
//! [`DesiredSpec`]. A pass:
//!
//! 1. checks canonical names fit the backend's identifier limit
//! 2. reads the trigger catalog (failure aborts the pass)
//! 3. creates every desired trigger whose canonical name is absent
//! 4. drops every canonical trigger that is no longer desired
//!
//! Individual create/drop failures are collected and the pass continues.
//! Running a pass twice against an unchanged catalog issues no DDL.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::backend::{ExistingTrigger, TriggerBackend};
use super::errors::{
    IdentifierKind, ReconcileError, ReconcileResult, SyncAction, TriggerSyncFailure,
};
use super::identifier::validate_identifier;
use super::naming::{is_canonical_for, TriggerDescriptor, TRIGGER_PREFIX};
use super::spec::DesiredSpec;
use crate::realtime::event::Operation;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub dropped: Vec<String>,
    pub unchanged: Vec<String>,

    /// Prefixed triggers not in canonical form; left alone
    pub ignored: Vec<String>,

    pub failures: Vec<TriggerSyncFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when changes were attempted and none of them succeeded
    pub fn is_total_failure(&self) -> bool {
        !self.failures.is_empty() && self.created.is_empty() && self.dropped.is_empty()
    }
}

pub struct Reconciler {
    backend: Arc<dyn TriggerBackend>,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn TriggerBackend>) -> Self {
        Self { backend }
    }

    /// Run one pass.
    ///
    /// Returns the report on full success. If any trigger change failed the
    /// report comes back inside [`ReconcileError::TriggerSync`].
    pub async fn reconcile(&self, desired: &DesiredSpec) -> ReconcileResult<ReconcileReport> {
        self.check_name_lengths(desired)?;
        tracing::info!(
            backend = self.backend.name(),
            tables = desired.tables().len(),
            "reconciling triggers"
        );

        let catalog = self.backend.list_existing_triggers().await?;
        let mut report = ReconcileReport::default();
        let mut existing: HashMap<String, ExistingTrigger> = HashMap::new();

        for trigger in catalog {
            if !trigger.name.starts_with(TRIGGER_PREFIX) {
                continue;
            }
            if is_canonical_for(&trigger.name, &trigger.table).is_some() {
                existing.insert(trigger.name.clone(), trigger);
            } else if !report.ignored.contains(&trigger.name) {
                tracing::warn!(
                    backend = self.backend.name(),
                    trigger = %trigger.name,
                    table = %trigger.table,
                    "ignoring prefixed trigger that is not in canonical form"
                );
                report.ignored.push(trigger.name);
            }
        }

        let mut column_cache: HashMap<String, Vec<String>> = HashMap::new();
        for descriptor in desired.descriptors() {
            if existing.contains_key(&descriptor.canonical_name) {
                report.unchanged.push(descriptor.canonical_name);
                continue;
            }

            match self.create(&descriptor, &mut column_cache).await {
                Ok(()) => {
                    tracing::info!(
                        backend = self.backend.name(),
                        trigger = %descriptor.canonical_name,
                        "trigger created"
                    );
                    report.created.push(descriptor.canonical_name);
                }
                Err(err) => {
                    let failure = TriggerSyncFailure {
                        action: SyncAction::Create,
                        table: descriptor.table,
                        operation: descriptor.operation,
                        canonical_name: descriptor.canonical_name,
                        message: err.to_string(),
                    };
                    tracing::warn!(backend = self.backend.name(), %failure, "trigger create failed");
                    report.failures.push(failure);
                }
            }
        }

        let mut stale: Vec<(Operation, ExistingTrigger)> = existing
            .into_values()
            .filter_map(|trigger| {
                let operation = is_canonical_for(&trigger.name, &trigger.table)?;
                (!desired.contains(&trigger.table, operation)).then_some((operation, trigger))
            })
            .collect();
        stale.sort_by(|a, b| a.1.name.cmp(&b.1.name));

        for (operation, trigger) in stale {
            match self.drop(&trigger).await {
                Ok(()) => {
                    tracing::info!(
                        backend = self.backend.name(),
                        trigger = %trigger.name,
                        "trigger dropped"
                    );
                    report.dropped.push(trigger.name);
                }
                Err(err) => {
                    let failure = TriggerSyncFailure {
                        action: SyncAction::Drop,
                        table: trigger.table,
                        operation,
                        canonical_name: trigger.name,
                        message: err.to_string(),
                    };
                    tracing::warn!(backend = self.backend.name(), %failure, "trigger drop failed");
                    report.failures.push(failure);
                }
            }
        }

        tracing::info!(
            backend = self.backend.name(),
            created = report.created.len(),
            dropped = report.dropped.len(),
            unchanged = report.unchanged.len(),
            ignored = report.ignored.len(),
            failed = report.failures.len(),
            "reconciliation pass finished"
        );

        if report.is_clean() {
            Ok(report)
        } else {
            Err(ReconcileError::TriggerSync(report))
        }
    }

    fn check_name_lengths(&self, desired: &DesiredSpec) -> ReconcileResult<()> {
        let limit = self.backend.max_identifier_len();
        match desired.descriptors().find(|d| d.canonical_name.len() > limit) {
            Some(descriptor) => Err(ReconcileError::Configuration(format!(
                "trigger name `{}` exceeds the {} backend limit of {} characters",
                descriptor.canonical_name,
                self.backend.name(),
                limit
            ))),
            None => Ok(()),
        }
    }

    async fn create(
        &self,
        descriptor: &TriggerDescriptor,
        column_cache: &mut HashMap<String, Vec<String>>,
    ) -> ReconcileResult<()> {
        let columns = match column_cache.get(&descriptor.table) {
            Some(columns) => columns.clone(),
            None => {
                let columns = self.backend.list_columns(&descriptor.table).await?;
                column_cache.insert(descriptor.table.clone(), columns.clone());
                columns
            }
        };

        if columns.is_empty() {
            return Err(ReconcileError::catalog(
                format!("reading columns of `{}`", descriptor.table),
                "table not found or has no columns",
            ));
        }

        for column in &columns {
            validate_identifier(IdentifierKind::Column, column)?;
        }

        self.backend.create_trigger(descriptor, &columns).await
    }

    async fn drop(&self, trigger: &ExistingTrigger) -> ReconcileResult<()> {
        validate_identifier(IdentifierKind::Table, &trigger.table)?;
        self.backend.drop_trigger(trigger).await
    }
}
