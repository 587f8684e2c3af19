//! # File-Backed State Directory
//!
//! ```text
//! <state_dir>/
//!   records/<report_id>.json        full submission record
//!   legacy/<report_id>.json         legacy shape (sink)
//!   audit/<report_id>.json          audit shape (sink)
//!   dissemination/<report_id>.json  public rows grouped by entity type
//! ```
//!
//! File names are report identifiers, validated by [`ReportId`] before
//! any path is built, so no caller-supplied text reaches the filesystem
//! unchecked. Writes go to a temporary sibling and are renamed into place.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use fac_core::ReportId;
use fac_etl::{DisseminationStore, EntityKind, ReportRows, StoreError};
use fac_state::{Lifecycle, Sink, SinkError, SubmissionRecord};

use crate::config::SinkKind;

const RECORDS: &str = "records";
const DISSEMINATION: &str = "dissemination";

/// Write `value` as pretty JSON via a temporary file and rename.
fn write_json(path: &Path, value: &impl Serialize) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

/// Handle on a state directory.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &ReportId) -> PathBuf {
        self.root.join(RECORDS).join(format!("{}.json", id.as_str()))
    }

    /// Path of a record's document in one sink.
    pub fn sink_path(&self, kind: SinkKind, id: &ReportId) -> PathBuf {
        self.root.join(kind.as_str()).join(format!("{}.json", id.as_str()))
    }

    pub fn has_record(&self, id: &ReportId) -> bool {
        self.record_path(id).is_file()
    }

    pub fn load_record(&self, id: &ReportId) -> Result<SubmissionRecord> {
        let path = self.record_path(id);
        if !path.is_file() {
            anyhow::bail!("no record for {id}: {} does not exist", path.display());
        }
        crate::read_json(&path)
    }

    pub fn save_record(&self, record: &SubmissionRecord) -> Result<()> {
        let path = self.record_path(record.report_id());
        write_json(&path, record).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Report ids of every stored record, sorted.
    ///
    /// Files whose names are not valid report ids are skipped with a warning.
    pub fn record_ids(&self) -> Result<Vec<ReportId>> {
        let dir = self.root.join(RECORDS);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match ReportId::new(stem) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(path = %path.display(), "skipping record file: {e}"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Read a record's document from one sink.
    pub fn sink_document(&self, kind: SinkKind, id: &ReportId) -> Result<Value> {
        crate::read_json(&self.sink_path(kind, id))
    }

    /// A lifecycle writing to `sinks` in order under this directory.
    pub fn lifecycle(&self, sinks: &[SinkKind]) -> Lifecycle {
        sinks.iter().fold(Lifecycle::new(), |machine, &kind| {
            machine.with_sink(FileSink {
                kind,
                dir: self.root.join(kind.as_str()),
            })
        })
    }

    pub fn dissemination_store(&self) -> FileDisseminationStore {
        FileDisseminationStore {
            dir: self.root.join(DISSEMINATION),
        }
    }
}

// ─── Sinks ───────────────────────────────────────────────────────────

/// Writes one storage shape per record to `<dir>/<report_id>.json`.
pub struct FileSink {
    kind: SinkKind,
    dir: PathBuf,
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn write(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        let document = (self.kind.render())(record);
        let path = self.dir.join(format!("{}.json", record.report_id().as_str()));
        write_json(&path, &document).map_err(|e| SinkError::new(format!("{}: {e}", path.display())))
    }
}

// ─── Dissemination rows ──────────────────────────────────────────────

/// Dissemination store holding one [`ReportRows`] file per report.
pub struct FileDisseminationStore {
    dir: PathBuf,
}

impl FileDisseminationStore {
    fn path(&self, report_id: &str) -> Result<PathBuf, StoreError> {
        let id = ReportId::new(report_id).map_err(StoreError::new)?;
        Ok(self.dir.join(format!("{}.json", id.as_str())))
    }

    /// Every row stored for a report. Empty if none were written.
    pub fn report(&self, report_id: &str) -> Result<ReportRows, StoreError> {
        let path = self.path(report_id)?;
        if !path.is_file() {
            return Ok(ReportRows {
                report_id: report_id.to_string(),
                ..ReportRows::default()
            });
        }
        let content = std::fs::read_to_string(&path).map_err(StoreError::new)?;
        serde_json::from_str(&content).map_err(StoreError::new)
    }
}

impl DisseminationStore for FileDisseminationStore {
    fn delete_report(&self, report_id: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(report_id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::new(e)),
        }
    }

    fn bulk_insert(&self, kind: EntityKind, rows: Vec<Value>) -> Result<usize, StoreError> {
        let count = rows.len();
        let mut by_report: std::collections::BTreeMap<String, Vec<Value>> = Default::default();
        for row in rows {
            let report_id = row
                .get("report_id")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::new(format!("{} row without report_id", kind.table())))?
                .to_string();
            by_report.entry(report_id).or_default().push(row);
        }
        for (report_id, mut rows) in by_report {
            let mut stored = self.report(&report_id)?;
            stored.tables.entry(kind).or_default().append(&mut rows);
            write_json(&self.path(&report_id)?, &stored).map_err(StoreError::new)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fac_state::{IntakeSections, SubmissionStatus};
    use serde_json::json;

    const ID: &str = "2023-06-GSAFAC-0000000001";

    fn record() -> SubmissionRecord {
        SubmissionRecord::new(ReportId::new(ID).unwrap(), "GSAFAC", IntakeSections::default())
    }

    #[test]
    fn record_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path());
        let rec = record();
        state.save_record(&rec).unwrap();
        assert!(state.has_record(rec.report_id()));
        assert_eq!(state.load_record(rec.report_id()).unwrap(), rec);
    }

    #[test]
    fn load_missing_record_names_id() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path());
        let err = state.load_record(&ReportId::new(ID).unwrap()).unwrap_err();
        assert!(err.to_string().contains(ID));
    }

    #[test]
    fn record_ids_skip_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path());
        state.save_record(&record()).unwrap();
        std::fs::write(dir.path().join("records/notes.json"), "{}").unwrap();
        std::fs::write(dir.path().join("records/readme.txt"), "").unwrap();
        let ids = state.record_ids().unwrap();
        assert_eq!(ids, vec![ReportId::new(ID).unwrap()]);
    }

    #[test]
    fn record_ids_empty_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StateDir::new(dir.path()).record_ids().unwrap().is_empty());
    }

    #[test]
    fn lifecycle_writes_each_sink_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path());
        let machine = state.lifecycle(&[SinkKind::Legacy, SinkKind::Audit]);
        assert_eq!(machine.sink_names(), vec!["legacy", "audit"]);

        let mut rec = record();
        let outcome = machine.lock_for_certification(&mut rec, Some("auditor@example.gov")).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(rec.status(), SubmissionStatus::ReadyForCertification);

        let legacy = state.sink_document(SinkKind::Legacy, rec.report_id()).unwrap();
        assert_eq!(legacy["submission_status"], "ready_for_certification");
        assert!(state.sink_document(SinkKind::Audit, rec.report_id()).is_ok());
    }

    #[test]
    fn dissemination_store_groups_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateDir::new(dir.path()).dissemination_store();
        let row = json!({"report_id": ID, "award_reference": "AWARD-00001"});

        assert_eq!(store.bulk_insert(EntityKind::FederalAward, vec![row.clone(), row.clone()]).unwrap(), 2);
        assert_eq!(store.report(ID).unwrap().tables[&EntityKind::FederalAward].len(), 2);

        store.delete_report(ID).unwrap();
        assert!(store.report(ID).unwrap().tables.is_empty());
        store.delete_report(ID).unwrap();
    }

    #[test]
    fn dissemination_store_rejects_rows_without_report_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateDir::new(dir.path()).dissemination_store();
        assert!(store.bulk_insert(EntityKind::Note, vec![json!({"note_title": "x"})]).is_err());
    }

    #[test]
    fn dissemination_store_rejects_unsafe_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateDir::new(dir.path()).dissemination_store();
        assert!(store.delete_report("../../etc/passwd").is_err());
    }
}
