//! # Dissemination Pipeline
//!
//! Ties the transform to the lifecycle: a SUBMITTED record is transformed,
//! its rows are persisted, and the record moves to DISSEMINATED.
//!
//! The transition comes last. If it fails the public rows exist but the
//! record is still SUBMITTED, and running the pipeline again replaces the
//! rows rather than duplicating them.
//!
//! Resubmission changes the chain fields of a report that is already
//! public. [`refresh_public_rows`] rewrites those rows without touching the
//! lifecycle.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use fac_state::{Lifecycle, LifecycleError, SinkFailure, SubmissionRecord, SubmissionStatus, TransitionOutcome};

use crate::entities::EntityKind;
use crate::persist::{persist, DisseminationStore, StoreError};
use crate::transform::{transform, TransformMode, TransformResult, TransformWarning};

/// Errors that stop a dissemination run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Only SUBMITTED records are disseminated.
    #[error("{report_id} is {status}, only SUBMITTED records can be disseminated")]
    NotEligible {
        report_id: String,
        status: SubmissionStatus,
    },

    /// Only DISSEMINATED and RESUBMITTED records have public rows.
    #[error("{report_id} is {status} and has no public rows to refresh")]
    NotPublished {
        report_id: String,
        status: SubmissionStatus,
    },

    /// Existing rows could not be cleared.
    #[error("dissemination store: {0}")]
    Store(#[from] StoreError),

    /// The DISSEMINATED transition was rejected.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Summary of one dissemination run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisseminationReport {
    pub report_id: String,
    /// Rows produced per entity type.
    pub counts: BTreeMap<EntityKind, usize>,
    /// Transform and persist warnings, in the order raised.
    pub warnings: Vec<TransformWarning>,
    /// Record sinks that missed the DISSEMINATED write.
    pub failed_sinks: Vec<SinkFailure>,
}

impl DisseminationReport {
    /// No warnings and every sink written.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failed_sinks.is_empty()
    }
}

/// Disseminate a SUBMITTED record.
pub fn disseminate(
    lifecycle: &Lifecycle,
    record: &mut SubmissionRecord,
    store: &dyn DisseminationStore,
    user: Option<&str>,
) -> Result<DisseminationReport, PipelineError> {
    let status = record.status();
    if status != SubmissionStatus::Submitted {
        return Err(PipelineError::NotEligible {
            report_id: record.report_id().to_string(),
            status,
        });
    }

    let TransformResult {
        mut batch,
        mut warnings,
    } = transform(record, TransformMode::Dissemination);
    warnings.extend(persist(&mut batch, store)?);

    let failed_sinks = match lifecycle.disseminate(record, user)? {
        TransitionOutcome::Applied => Vec::new(),
        TransitionOutcome::PartialWrite { failed } => failed,
    };

    let report = DisseminationReport {
        report_id: record.report_id().to_string(),
        counts: batch.counts(),
        warnings,
        failed_sinks,
    };
    tracing::info!(
        report_id = %report.report_id,
        rows = batch.total(),
        warnings = report.warnings.len(),
        "disseminated"
    );
    Ok(report)
}

/// Re-transform a public record and replace its rows. No transition is
/// applied and no record sink is written.
pub fn refresh_public_rows(
    record: &SubmissionRecord,
    store: &dyn DisseminationStore,
) -> Result<DisseminationReport, PipelineError> {
    let status = record.status();
    if !matches!(
        status,
        SubmissionStatus::Disseminated | SubmissionStatus::Resubmitted
    ) {
        return Err(PipelineError::NotPublished {
            report_id: record.report_id().to_string(),
            status,
        });
    }

    let TransformResult {
        mut batch,
        mut warnings,
    } = transform(record, TransformMode::Dissemination);
    warnings.extend(persist(&mut batch, store)?);

    tracing::info!(
        report_id = %record.report_id(),
        rows = batch.total(),
        resubmission_status = %record.resubmission.status(),
        "public rows refreshed"
    );
    Ok(DisseminationReport {
        report_id: record.report_id().to_string(),
        counts: batch.counts(),
        warnings,
        failed_sinks: Vec::new(),
    })
}

/// Pre-certification preview: transform only, any status, nothing written.
pub fn preview(record: &SubmissionRecord) -> TransformResult {
    transform(record, TransformMode::PreCertificationReview)
}
