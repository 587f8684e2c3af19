//! # Persist Phase
//!
//! Writes a [`DisseminationBatch`] to a [`DisseminationStore`].
//!
//! ## Semantics
//!
//! 1. Delete every existing row for the report. Rows are replaced
//!    wholesale, never patched. A failed delete aborts the phase.
//! 2. For each entity type in loader order, stamp every row with its
//!    canonical hash and bulk insert the set.
//! 3. A hash or insert failure for one type is logged with the type name
//!    and cause and returned as [`TransformWarning::PersistFailure`]. The
//!    remaining types are still written.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::entities::{Disseminated, EntityKind};
use crate::transform::{DisseminationBatch, TransformWarning};

/// Error raised by a dissemination store.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Wrap any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Destination for public dissemination rows.
pub trait DisseminationStore: Send + Sync {
    /// Remove every row of every type for `report_id`.
    fn delete_report(&self, report_id: &str) -> Result<(), StoreError>;

    /// Insert a set of rows of one type in a single operation.
    fn bulk_insert(&self, kind: EntityKind, rows: Vec<Value>) -> Result<usize, StoreError>;
}

impl<S: DisseminationStore + ?Sized> DisseminationStore for std::sync::Arc<S> {
    fn delete_report(&self, report_id: &str) -> Result<(), StoreError> {
        (**self).delete_report(report_id)
    }

    fn bulk_insert(&self, kind: EntityKind, rows: Vec<Value>) -> Result<usize, StoreError> {
        (**self).bulk_insert(kind, rows)
    }
}

/// Stamp hashes and insert every type. Returns per-type warnings.
///
/// # Errors
///
/// Only the initial delete is fatal.
pub fn persist(
    batch: &mut DisseminationBatch,
    store: &dyn DisseminationStore,
) -> Result<Vec<TransformWarning>, StoreError> {
    store.delete_report(&batch.report_id)?;

    let report_id = batch.report_id.clone();
    let mut warnings = Vec::new();
    let mut note = |result: Result<usize, (EntityKind, String)>| match result {
        Ok(count) => tracing::debug!(report_id = %report_id, count, "rows inserted"),
        Err((entity, cause)) => {
            tracing::warn!(
                report_id = %report_id,
                entity = %entity,
                error = %cause,
                "dissemination insert failed"
            );
            warnings.push(TransformWarning::PersistFailure { entity, cause });
        }
    };

    note(write_kind(&mut batch.general, store));
    note(write_kind(&mut batch.secondary_auditors, store));
    note(write_kind(&mut batch.federal_awards, store));
    note(write_kind(&mut batch.findings, store));
    note(write_kind(&mut batch.findings_text, store));
    note(write_kind(&mut batch.passthroughs, store));
    note(write_kind(&mut batch.corrective_action_texts, store));
    note(write_kind(&mut batch.notes, store));
    note(write_kind(&mut batch.additional_ueis, store));
    note(write_kind(&mut batch.additional_eins, store));

    Ok(warnings)
}

fn write_kind<T: Disseminated>(
    rows: &mut [T],
    store: &dyn DisseminationStore,
) -> Result<usize, (EntityKind, String)> {
    let fail = |cause: String| (T::KIND, cause);
    if rows.is_empty() {
        return Ok(0);
    }
    let mut values = Vec::with_capacity(rows.len());
    for row in rows.iter_mut() {
        row.stamp_hash().map_err(|e| fail(e.to_string()))?;
        values.push(serde_json::to_value(&*row).map_err(|e| fail(e.to_string()))?);
    }
    store
        .bulk_insert(T::KIND, values)
        .map_err(|e| fail(e.to_string()))
}

// ─── In-memory store ─────────────────────────────────────────────────

/// Dissemination store held in memory, keyed by entity type.
#[derive(Debug, Default)]
pub struct MemoryDisseminationStore {
    tables: Mutex<BTreeMap<EntityKind, Vec<Value>>>,
    failing: BTreeSet<EntityKind>,
}

/// Snapshot of one report's rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRows {
    pub report_id: String,
    pub tables: BTreeMap<EntityKind, Vec<Value>>,
}

impl MemoryDisseminationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose inserts for `kind` always fail.
    pub fn failing_on(mut self, kind: EntityKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Rows of one type for one report.
    pub fn rows(&self, kind: EntityKind, report_id: &str) -> Vec<Value> {
        self.tables
            .lock()
            .map(|tables| {
                tables
                    .get(&kind)
                    .into_iter()
                    .flatten()
                    .filter(|row| row.get("report_id").and_then(Value::as_str) == Some(report_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every row for one report, grouped by type.
    pub fn report(&self, report_id: &str) -> ReportRows {
        let tables = crate::entities::LOAD_ORDER
            .into_iter()
            .map(|kind| (kind, self.rows(kind, report_id)))
            .filter(|(_, rows)| !rows.is_empty())
            .collect();
        ReportRows {
            report_id: report_id.to_string(),
            tables,
        }
    }

    /// Load rows previously written elsewhere, e.g. from disk.
    pub fn restore(&self, rows: ReportRows) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::new("store mutex poisoned"))?;
        for (kind, mut values) in rows.tables {
            tables.entry(kind).or_default().append(&mut values);
        }
        Ok(())
    }
}

impl DisseminationStore for MemoryDisseminationStore {
    fn delete_report(&self, report_id: &str) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::new("store mutex poisoned"))?;
        for rows in tables.values_mut() {
            rows.retain(|row| row.get("report_id").and_then(Value::as_str) != Some(report_id));
        }
        Ok(())
    }

    fn bulk_insert(&self, kind: EntityKind, mut rows: Vec<Value>) -> Result<usize, StoreError> {
        if self.failing.contains(&kind) {
            return Err(StoreError::new(format!("{} rejected the insert", kind.table())));
        }
        let count = rows.len();
        self.tables
            .lock()
            .map_err(|_| StoreError::new("store mutex poisoned"))?
            .entry(kind)
            .or_default()
            .append(&mut rows);
        Ok(count)
    }
}
