//! # Resubmission Version Chain
//!
//! A resubmission supersedes an earlier disseminated report. Each record
//! carries a version, back/forward links, and a status derived from them:
//!
//! ```text
//! next link present  → DEPRECATED
//! version > 1        → MOST_RECENT
//! version == 1       → ORIGINAL
//! version == 0       → UNKNOWN      (records predating versioning)
//! ```
//!
//! ## Invariants
//!
//! - A chain has exactly one head: the only node without a next link.
//! - Every node except the first has a previous link.
//! - Versions increase by one along the chain.
//!
//! Any record that violates these is corrupt upstream data. Derivation fails
//! with [`ChainError::InvariantViolation`] rather than guessing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fac_core::ReportId;

use crate::lifecycle::{Lifecycle, LifecycleError, TransitionOutcome};
use crate::record::SubmissionRecord;
use crate::status::SubmissionStatus;

// ─── Status ──────────────────────────────────────────────────────────

/// Position of a record within its resubmission chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubmissionStatus {
    /// Only version of its report.
    Original,
    /// Live head of a chain longer than one.
    MostRecent,
    /// Superseded by a later resubmission.
    Deprecated,
    /// Version unknown (legacy data).
    #[default]
    Unknown,
}

impl std::fmt::Display for ResubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Original => "ORIGINAL",
            Self::MostRecent => "MOST_RECENT",
            Self::Deprecated => "DEPRECATED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised while deriving or linking chain state.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Version and links describe an impossible chain position.
    #[error("chain invariant violated at {report_id}: {reason}")]
    InvariantViolation {
        /// Record where the violation was found.
        report_id: String,
        /// What was violated.
        reason: String,
    },

    /// The record already has a successor; chains do not fork.
    #[error("{report_id} was already superseded by {next}")]
    AlreadySuperseded {
        /// Record that was to be resubmitted.
        report_id: String,
        /// Its existing successor.
        next: String,
    },

    /// The lifecycle rejected the resubmission marker.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

fn violation(report_id: &ReportId, reason: impl Into<String>) -> ChainError {
    ChainError::InvariantViolation {
        report_id: report_id.to_string(),
        reason: reason.into(),
    }
}

// ─── Meta ────────────────────────────────────────────────────────────

/// Resubmission state carried on every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResubmissionMeta {
    /// Position in the chain, 1 for the first submission; 0 when unknown.
    pub version: u32,
    #[serde(rename = "resubmission_status", default)]
    status: ResubmissionStatus,
    /// The record this one supersedes.
    #[serde(default)]
    pub previous_report_id: Option<ReportId>,
    /// The record that supersedes this one.
    #[serde(default)]
    pub next_report_id: Option<ReportId>,
}

impl ResubmissionMeta {
    /// Meta for a brand new, first submission.
    pub fn original() -> Self {
        Self {
            version: 1,
            status: ResubmissionStatus::Original,
            previous_report_id: None,
            next_report_id: None,
        }
    }

    /// The stored status.
    pub fn status(&self) -> ResubmissionStatus {
        self.status
    }

    /// Derive the status this meta should have.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when version and links are inconsistent or a
    /// link points at `own_id`.
    pub fn derive(&self, own_id: &ReportId) -> Result<ResubmissionStatus, ChainError> {
        if self.previous_report_id.as_ref() == Some(own_id) {
            return Err(violation(own_id, "previous link points at itself"));
        }
        if self.next_report_id.as_ref() == Some(own_id) {
            return Err(violation(own_id, "next link points at itself"));
        }
        if self.previous_report_id.is_some() && self.previous_report_id == self.next_report_id {
            return Err(violation(own_id, "previous and next links are the same record"));
        }
        derive_status(self.version, self.previous_report_id.is_some(), self.next_report_id.is_some())
            .map_err(|reason| violation(own_id, reason))
    }

    /// Recompute and store the status.
    pub fn refresh(&mut self, own_id: &ReportId) -> Result<ResubmissionStatus, ChainError> {
        self.status = self.derive(own_id)?;
        Ok(self.status)
    }
}

/// The derivation rule on raw inputs.
///
/// Returns the reason string on impossible combinations: a version-0 record
/// cannot be a resubmission, and a record past version 1 must link back.
pub fn derive_status(
    version: u32,
    has_previous: bool,
    has_next: bool,
) -> Result<ResubmissionStatus, &'static str> {
    if version == 0 && has_previous {
        return Err("version 0 record has a previous link");
    }
    if version > 1 && !has_previous {
        return Err("resubmitted version has no previous link");
    }
    Ok(if has_next {
        ResubmissionStatus::Deprecated
    } else if version > 1 {
        ResubmissionStatus::MostRecent
    } else if version == 1 {
        ResubmissionStatus::Original
    } else {
        ResubmissionStatus::Unknown
    })
}

// ─── Linking ─────────────────────────────────────────────────────────

/// Link `next` as the resubmission of `previous` and recompute both statuses.
///
/// Both records are left unchanged on error.
pub fn link_resubmission(
    previous: &mut SubmissionRecord,
    next: &mut SubmissionRecord,
) -> Result<(), ChainError> {
    if previous.report_id() == next.report_id() {
        return Err(violation(previous.report_id(), "cannot resubmit onto itself"));
    }
    if let Some(existing) = &previous.resubmission.next_report_id {
        return Err(ChainError::AlreadySuperseded {
            report_id: previous.report_id().to_string(),
            next: existing.to_string(),
        });
    }

    // Legacy records carry version 0; they count as the original of their chain.
    let mut prev_meta = previous.resubmission.clone();
    prev_meta.version = prev_meta.version.max(1);
    prev_meta.next_report_id = Some(next.report_id().clone());
    prev_meta.refresh(previous.report_id())?;

    let mut next_meta = ResubmissionMeta {
        version: prev_meta.version + 1,
        status: ResubmissionStatus::Unknown,
        previous_report_id: Some(previous.report_id().clone()),
        next_report_id: None,
    };
    next_meta.refresh(next.report_id())?;

    previous.resubmission = prev_meta;
    next.resubmission = next_meta;
    Ok(())
}

/// Outcome of a resubmission command.
#[derive(Debug)]
pub struct Resubmission {
    /// The new IN_PROGRESS record.
    pub record: SubmissionRecord,
    /// Sink outcome for the superseded record.
    pub previous_outcome: TransitionOutcome,
    /// Sink outcome for the new record.
    pub next_outcome: TransitionOutcome,
}

/// Start a resubmission of a disseminated report.
///
/// Creates a new IN_PROGRESS record carrying a copy of the intake, links the
/// chain, writes the new record through the lifecycle's sinks, then appends
/// the RESUBMITTED marker to the original. `original` is left unchanged if
/// either primary write is rejected.
pub fn resubmit(
    lifecycle: &Lifecycle,
    original: &mut SubmissionRecord,
    new_report_id: ReportId,
    user: Option<&str>,
) -> Result<Resubmission, ChainError> {
    let status = original.status();
    if status.is_terminal() {
        if let Some(next) = &original.resubmission.next_report_id {
            return Err(ChainError::AlreadySuperseded {
                report_id: original.report_id().to_string(),
                next: next.to_string(),
            });
        }
    }
    if status != SubmissionStatus::Disseminated {
        return Err(LifecycleError::InvalidTransition {
            report_id: original.report_id().to_string(),
            from: status,
            to: SubmissionStatus::Resubmitted,
        }
        .into());
    }

    let mut staged = original.clone();
    let mut record = original.fork_intake(new_report_id);
    link_resubmission(&mut staged, &mut record)?;

    let next_outcome = lifecycle.sync(&record)?;
    let previous_outcome = lifecycle.mark_resubmitted(&mut staged, user)?;
    *original = staged;

    tracing::info!(
        previous = %original.report_id(),
        next = %record.report_id(),
        version = record.resubmission.version,
        "resubmission started"
    );

    Ok(Resubmission {
        record,
        previous_outcome,
        next_outcome,
    })
}

// ─── Chain view ──────────────────────────────────────────────────────

/// Collect the full chain containing `start`, oldest first.
///
/// `lookup` resolves a report id to its record. Missing links and cycles
/// are invariant violations.
pub fn walk_chain<'a>(
    start: &'a SubmissionRecord,
    lookup: impl Fn(&ReportId) -> Option<&'a SubmissionRecord>,
) -> Result<Vec<&'a SubmissionRecord>, ChainError> {
    let mut seen = BTreeSet::new();
    seen.insert(start.report_id().clone());

    let mut first = start;
    while let Some(prev_id) = &first.resubmission.previous_report_id {
        if !seen.insert(prev_id.clone()) {
            return Err(violation(prev_id, "cycle in previous links"));
        }
        first = lookup(prev_id)
            .ok_or_else(|| violation(first.report_id(), format!("previous {prev_id} not found")))?;
    }

    let mut chain = vec![first];
    let mut visited = BTreeSet::new();
    visited.insert(first.report_id().clone());
    let mut cursor = first;
    while let Some(next_id) = &cursor.resubmission.next_report_id {
        if !visited.insert(next_id.clone()) {
            return Err(violation(next_id, "cycle in next links"));
        }
        cursor = lookup(next_id)
            .ok_or_else(|| violation(cursor.report_id(), format!("next {next_id} not found")))?;
        chain.push(cursor);
    }
    Ok(chain)
}

/// Check every chain invariant over an ordered chain (see [`walk_chain`]).
pub fn validate_chain(chain: &[&SubmissionRecord]) -> Result<(), ChainError> {
    let Some(first) = chain.first() else {
        return Ok(());
    };
    if first.resubmission.previous_report_id.is_some() {
        return Err(violation(first.report_id(), "first record has a previous link"));
    }

    for pair in chain.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.resubmission.next_report_id.as_ref() != Some(b.report_id())
            || b.resubmission.previous_report_id.as_ref() != Some(a.report_id())
        {
            return Err(violation(a.report_id(), "links are not symmetric"));
        }
        if b.resubmission.version != a.resubmission.version + 1 {
            return Err(violation(b.report_id(), "version does not follow predecessor"));
        }
    }

    let heads = chain
        .iter()
        .filter(|r| r.resubmission.next_report_id.is_none())
        .count();
    if heads != 1 {
        return Err(violation(first.report_id(), format!("chain has {heads} heads")));
    }

    if let Some(head) = chain.last() {
        let status = head.resubmission.status();
        let expected = match chain.len() {
            1 => matches!(status, ResubmissionStatus::Original | ResubmissionStatus::Unknown),
            _ => status == ResubmissionStatus::MostRecent,
        };
        if !expected {
            return Err(violation(head.report_id(), format!("chain head is {status}")));
        }
    }

    for record in chain {
        let derived = record.resubmission.derive(record.report_id())?;
        if derived != record.resubmission.status() {
            return Err(violation(
                record.report_id(),
                format!(
                    "stored status {} but links derive {derived}",
                    record.resubmission.status()
                ),
            ));
        }
    }
    Ok(())
}

/// Records indexed by report id, for walking and validating chains.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    records: BTreeMap<ReportId, SubmissionRecord>,
}

impl Chain {
    /// Index a set of records.
    pub fn from_records(records: impl IntoIterator<Item = SubmissionRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.report_id().clone(), r))
                .collect(),
        }
    }

    /// Look up one record.
    pub fn get(&self, report_id: &ReportId) -> Option<&SubmissionRecord> {
        self.records.get(report_id)
    }

    /// The chain containing `from`, oldest first.
    pub fn walk(&self, from: &ReportId) -> Result<Vec<&SubmissionRecord>, ChainError> {
        let start = self
            .get(from)
            .ok_or_else(|| violation(from, "record not found"))?;
        walk_chain(start, |id| self.records.get(id))
    }

    /// The live head of the chain containing `from`.
    pub fn head(&self, from: &ReportId) -> Result<&SubmissionRecord, ChainError> {
        self.walk(from)?
            .pop()
            .ok_or_else(|| violation(from, "empty chain"))
    }

    /// Validate every chain in the index.
    pub fn validate(&self) -> Result<(), ChainError> {
        let mut seen = BTreeSet::new();
        for id in self.records.keys() {
            if seen.contains(id) {
                continue;
            }
            let chain = self.walk(id)?;
            validate_chain(&chain)?;
            seen.extend(chain.iter().map(|r| r.report_id().clone()));
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::record::{IntakeSections, TransitionEntry};
    use crate::shape::to_legacy_document;
    use crate::sink::{MemorySink, Sink, SinkError};
    use fac_core::Timestamp;

    fn id(n: u32) -> ReportId {
        ReportId::new(format!("2023-06-GSAFAC-{n:010}")).unwrap()
    }

    fn disseminated(n: u32) -> SubmissionRecord {
        let mut r = SubmissionRecord::new(id(n), "GSAFAC", IntakeSections::default());
        r.push_history(TransitionEntry {
            status: SubmissionStatus::Disseminated,
            timestamp: Timestamp::now(),
            user: None,
        });
        r
    }

    // ── Derivation rule ──────────────────────────────────────────────

    #[test]
    fn test_derivation_table() {
        use ResubmissionStatus::*;
        assert_eq!(derive_status(1, false, false), Ok(Original));
        assert_eq!(derive_status(2, true, false), Ok(MostRecent));
        assert_eq!(derive_status(1, false, true), Ok(Deprecated));
        assert_eq!(derive_status(3, true, true), Ok(Deprecated));
        assert_eq!(derive_status(0, false, false), Ok(Unknown));
        assert_eq!(derive_status(0, false, true), Ok(Deprecated));
        assert_eq!(derive_status(1, true, false), Ok(Original));
    }

    #[test]
    fn test_derivation_rejects_impossible_inputs() {
        assert!(derive_status(0, true, false).is_err());
        assert!(derive_status(2, false, false).is_err());
    }

    #[test]
    fn test_self_link_is_violation() {
        let mut meta = ResubmissionMeta::original();
        meta.next_report_id = Some(id(1));
        assert!(matches!(
            meta.derive(&id(1)),
            Err(ChainError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_previous_equals_next_is_violation() {
        let meta = ResubmissionMeta {
            version: 2,
            status: ResubmissionStatus::Unknown,
            previous_report_id: Some(id(1)),
            next_report_id: Some(id(1)),
        };
        assert!(meta.derive(&id(2)).is_err());
    }

    // ── Linking ──────────────────────────────────────────────────────

    #[test]
    fn test_resubmit_original_version_one() {
        let mut a = disseminated(1);
        let mut b = SubmissionRecord::new(id(2), "GSAFAC", IntakeSections::default());
        link_resubmission(&mut a, &mut b).unwrap();

        assert_eq!(a.resubmission.status(), ResubmissionStatus::Deprecated);
        assert_eq!(a.resubmission.next_report_id, Some(id(2)));
        assert_eq!(b.resubmission.version, 2);
        assert_eq!(b.resubmission.status(), ResubmissionStatus::MostRecent);
        assert_eq!(b.resubmission.previous_report_id, Some(id(1)));
    }

    #[test]
    fn test_resubmit_legacy_version_zero_counts_as_original() {
        let mut a = disseminated(1);
        a.resubmission = ResubmissionMeta::default();
        let mut b = SubmissionRecord::new(id(2), "GSAFAC", IntakeSections::default());
        link_resubmission(&mut a, &mut b).unwrap();

        assert_eq!(a.resubmission.version, 1);
        assert_eq!(a.resubmission.status(), ResubmissionStatus::Deprecated);
        assert_eq!(b.resubmission.version, 2);
        assert_eq!(b.resubmission.status(), ResubmissionStatus::MostRecent);
        validate_chain(&[&a, &b]).unwrap();
    }

    #[test]
    fn test_cannot_fork_a_chain() {
        let mut a = disseminated(1);
        let mut b = SubmissionRecord::new(id(2), "GSAFAC", IntakeSections::default());
        let mut c = SubmissionRecord::new(id(3), "GSAFAC", IntakeSections::default());
        link_resubmission(&mut a, &mut b).unwrap();
        let err = link_resubmission(&mut a, &mut c).unwrap_err();
        assert!(matches!(err, ChainError::AlreadySuperseded { .. }));
        assert_eq!(c.resubmission, ResubmissionMeta::original());
    }

    // ── Command ──────────────────────────────────────────────────────

    #[test]
    fn test_resubmit_command_marks_and_writes_both() {
        let sink = Arc::new(MemorySink::new("legacy", to_legacy_document));
        let machine = Lifecycle::new().with_sink(sink.clone());
        let mut a = disseminated(1);

        let result = resubmit(&machine, &mut a, id(2), Some("auditee@example.gov")).unwrap();
        assert!(result.previous_outcome.is_complete());
        assert!(result.next_outcome.is_complete());
        assert_eq!(a.status(), SubmissionStatus::Resubmitted);
        assert_eq!(result.record.status(), SubmissionStatus::InProgress);
        assert_eq!(result.record.resubmission.version, 2);
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink.document(id(1).as_str()).unwrap()["resubmission_meta"]["resubmission_status"],
            "deprecated"
        );
    }

    #[test]
    fn test_resubmit_requires_disseminated() {
        let machine = Lifecycle::new();
        let mut a = SubmissionRecord::new(id(1), "GSAFAC", IntakeSections::default());
        let err = resubmit(&machine, &mut a, id(2), None).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Lifecycle(LifecycleError::InvalidTransition { .. })
        ));
        assert!(a.resubmission.next_report_id.is_none());
    }

    #[test]
    fn test_resubmit_of_superseded_record_names_successor() {
        let machine = Lifecycle::new();
        let mut a = disseminated(1);
        resubmit(&machine, &mut a, id(2), None).unwrap();
        let err = resubmit(&machine, &mut a, id(3), None).unwrap_err();
        assert!(matches!(
            err,
            ChainError::AlreadySuperseded { ref next, .. } if next == id(2).as_str()
        ));
    }

    #[test]
    fn test_resubmit_primary_failure_leaves_original() {
        let machine = Lifecycle::new().with_sink(MemorySink::failing("legacy"));
        let mut a = disseminated(1);
        assert!(resubmit(&machine, &mut a, id(2), None).is_err());
        assert_eq!(a.status(), SubmissionStatus::Disseminated);
        assert!(a.resubmission.next_report_id.is_none());
    }

    #[test]
    fn test_resubmit_rejected_new_record_leaves_original() {
        struct RejectReport(ReportId);
        impl Sink for RejectReport {
            fn name(&self) -> &str {
                "legacy"
            }
            fn write(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
                if record.report_id() == &self.0 {
                    return Err(SinkError::new("rejected"));
                }
                Ok(())
            }
        }

        let machine = Lifecycle::new().with_sink(RejectReport(id(2)));
        let mut a = disseminated(1);
        let err = resubmit(&machine, &mut a, id(2), None).unwrap_err();
        assert!(matches!(err, ChainError::Lifecycle(LifecycleError::Sink { .. })));
        assert_eq!(a.status(), SubmissionStatus::Disseminated);
        assert!(a.resubmission.next_report_id.is_none());
        assert_eq!(a.resubmission.status(), ResubmissionStatus::Original);
    }

    // ── Chain walk ───────────────────────────────────────────────────

    fn three_link_chain() -> BTreeMap<ReportId, SubmissionRecord> {
        let machine = Lifecycle::new();
        let mut a = disseminated(1);
        let mut b = resubmit(&machine, &mut a, id(2), None).unwrap().record;
        b.push_history(TransitionEntry {
            status: SubmissionStatus::Disseminated,
            timestamp: Timestamp::now(),
            user: None,
        });
        let c = resubmit(&machine, &mut b, id(3), None).unwrap().record;
        [a, b, c]
            .into_iter()
            .map(|r| (r.report_id().clone(), r))
            .collect()
    }

    #[test]
    fn test_walk_from_any_node_yields_whole_chain() {
        let records = three_link_chain();
        for start in records.values() {
            let chain = walk_chain(start, |id| records.get(id)).unwrap();
            let ids: Vec<_> = chain.iter().map(|r| r.report_id().clone()).collect();
            assert_eq!(ids, vec![id(1), id(2), id(3)]);
            validate_chain(&chain).unwrap();
        }
    }

    #[test]
    fn test_chain_statuses() {
        let records = three_link_chain();
        assert_eq!(records[&id(1)].resubmission.status(), ResubmissionStatus::Deprecated);
        assert_eq!(records[&id(2)].resubmission.status(), ResubmissionStatus::Deprecated);
        assert_eq!(records[&id(3)].resubmission.status(), ResubmissionStatus::MostRecent);
        assert_eq!(records[&id(3)].resubmission.version, 3);
    }

    #[test]
    fn test_chain_index_validates_and_finds_head() {
        let chain = Chain::from_records(three_link_chain().into_values());
        chain.validate().unwrap();
        assert_eq!(chain.head(&id(1)).unwrap().report_id(), &id(3));
        assert_eq!(chain.walk(&id(2)).unwrap().len(), 3);
        assert!(chain.walk(&id(9)).is_err());
    }

    #[test]
    fn test_walk_reports_missing_link() {
        let mut records = three_link_chain();
        records.remove(&id(2));
        let start = &records[&id(3)];
        assert!(walk_chain(start, |id| records.get(id)).is_err());
    }

    #[test]
    fn test_validate_rejects_stale_status() {
        let mut records = three_link_chain();
        if let Some(b) = records.get_mut(&id(2)) {
            b.resubmission.status = ResubmissionStatus::MostRecent;
        }
        let start = &records[&id(1)];
        let chain = walk_chain(start, |id| records.get(id)).unwrap();
        assert!(validate_chain(&chain).is_err());
    }

    #[test]
    fn test_validate_rejects_original_head_of_longer_chain() {
        let mut a = disseminated(1);
        a.resubmission.next_report_id = Some(id(2));
        a.resubmission.status = ResubmissionStatus::Deprecated;
        let mut b = SubmissionRecord::new(id(2), "GSAFAC", IntakeSections::default());
        b.resubmission = ResubmissionMeta {
            version: 2,
            status: ResubmissionStatus::Original,
            previous_report_id: Some(id(1)),
            next_report_id: None,
        };
        let err = validate_chain(&[&a, &b]).unwrap_err();
        assert!(matches!(err, ChainError::InvariantViolation { .. }));
    }

    #[test]
    fn test_validate_accepts_single_original() {
        let a = disseminated(1);
        validate_chain(&[&a]).unwrap();
    }
}
