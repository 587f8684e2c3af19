//! # Intake-to-Dissemination Transform
//!
//! Denormalizes one submission's nested intake into the flat public
//! entities, one collection per [`EntityKind`].
//!
//! ## Loader Order
//!
//! Loaders run in [`LOAD_ORDER`]. The General loader runs first and produces
//! the anchor row every other loader keys its rows to. Without an anchor a
//! downstream loader yields nothing and records
//! [`TransformWarning::MissingAnchor`]; the other loaders still run.
//!
//! ## Tolerance
//!
//! Section problems are warnings, never errors. An absent section yields an
//! empty collection and [`TransformWarning::SectionMissing`]; a present
//! section without the expected wrapper or list yields
//! [`TransformWarning::SectionMalformed`]. Values inside a well-shaped
//! section are not validated here.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use fac_state::SubmissionRecord;

use crate::entities::{
    AdditionalEin, AdditionalUei, CorrectiveActionText, EntityKind, FederalAward, Finding,
    FindingText, General, Note, Passthrough, SecondaryAuditor, LOAD_ORDER,
};
use crate::loaders;

/// Which consumer the transform output is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    /// Public dissemination of a submitted report.
    #[default]
    Dissemination,
    /// Preview before certification. Certifier names, titles and
    /// certification dates do not exist yet and are left empty.
    PreCertificationReview,
}

impl TransformMode {
    /// Whether certifier fields are populated.
    pub fn includes_certification(&self) -> bool {
        matches!(self, Self::Dissemination)
    }
}

/// Non-fatal problem recorded during transform or persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum TransformWarning {
    /// The intake section is absent.
    SectionMissing {
        section: &'static str,
        entity: EntityKind,
    },
    /// The section is present but not in the expected shape.
    SectionMalformed {
        section: &'static str,
        entity: EntityKind,
        detail: String,
    },
    /// No anchor General row; this loader's output is empty.
    MissingAnchor { entity: EntityKind },
    /// Hashing or inserting this entity type failed.
    PersistFailure { entity: EntityKind, cause: String },
}

impl std::fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SectionMissing { section, entity } => {
                write!(f, "{entity}: section {section} is missing")
            }
            Self::SectionMalformed {
                section,
                entity,
                detail,
            } => write!(f, "{entity}: section {section} is malformed ({detail})"),
            Self::MissingAnchor { entity } => {
                write!(f, "{entity}: skipped, no General row to anchor to")
            }
            Self::PersistFailure { entity, cause } => {
                write!(f, "{entity}: persist failed: {cause}")
            }
        }
    }
}

/// Every entity produced for one report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisseminationBatch {
    pub report_id: String,
    pub general: Vec<General>,
    pub secondary_auditors: Vec<SecondaryAuditor>,
    pub federal_awards: Vec<FederalAward>,
    pub findings: Vec<Finding>,
    pub findings_text: Vec<FindingText>,
    pub passthroughs: Vec<Passthrough>,
    pub corrective_action_texts: Vec<CorrectiveActionText>,
    pub notes: Vec<Note>,
    pub additional_ueis: Vec<AdditionalUei>,
    pub additional_eins: Vec<AdditionalEin>,
}

impl DisseminationBatch {
    /// Number of rows of one type.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::General => self.general.len(),
            EntityKind::SecondaryAuditor => self.secondary_auditors.len(),
            EntityKind::FederalAward => self.federal_awards.len(),
            EntityKind::Finding => self.findings.len(),
            EntityKind::FindingText => self.findings_text.len(),
            EntityKind::Passthrough => self.passthroughs.len(),
            EntityKind::CorrectiveActionText => self.corrective_action_texts.len(),
            EntityKind::Note => self.notes.len(),
            EntityKind::AdditionalUei => self.additional_ueis.len(),
            EntityKind::AdditionalEin => self.additional_eins.len(),
        }
    }

    /// Row counts for every type, including zeros.
    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        LOAD_ORDER.into_iter().map(|k| (k, self.count(k))).collect()
    }

    /// Total rows across all types.
    pub fn total(&self) -> usize {
        LOAD_ORDER.into_iter().map(|k| self.count(k)).sum()
    }
}

/// Transform output: the batch plus every warning raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformResult {
    pub batch: DisseminationBatch,
    pub warnings: Vec<TransformWarning>,
}

/// Read access to one record's sections with warning collection.
pub(crate) struct LoadContext<'a> {
    pub record: &'a SubmissionRecord,
    pub mode: TransformMode,
    warnings: Vec<TransformWarning>,
}

impl<'a> LoadContext<'a> {
    fn new(record: &'a SubmissionRecord, mode: TransformMode) -> Self {
        Self {
            record,
            mode,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: TransformWarning) {
        tracing::debug!(report_id = %self.record.report_id(), %warning, "transform warning");
        self.warnings.push(warning);
    }

    /// Open a section, unwrapping `wrapper` when given.
    ///
    /// Returns the object inside, or `None` after recording a warning.
    pub fn section(
        &mut self,
        section: &'static str,
        wrapper: Option<&str>,
        entity: EntityKind,
    ) -> Option<&'a Value> {
        let record = self.record;
        let Some(raw) = record.intake().get(section) else {
            self.warn(TransformWarning::SectionMissing { section, entity });
            return None;
        };
        let inner = match wrapper {
            Some(key) => raw.get(key),
            None => Some(raw),
        };
        match inner {
            Some(value) if value.is_object() => Some(value),
            _ => {
                let detail = match wrapper {
                    Some(key) => format!("expected object under {key}"),
                    None => "expected object".to_string(),
                };
                self.warn(TransformWarning::SectionMalformed {
                    section,
                    entity,
                    detail,
                });
                None
            }
        }
    }

    /// The entry list `key` inside an opened section. Absent is empty;
    /// anything other than a list is malformed.
    pub fn entries(
        &mut self,
        body: &'a Value,
        key: &str,
        section: &'static str,
        entity: EntityKind,
    ) -> &'a [Value] {
        match body.get(key) {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.warn(TransformWarning::SectionMalformed {
                    section,
                    entity,
                    detail: format!("{key} is not a list"),
                });
                &[]
            }
        }
    }
}

/// Run every loader over `record`.
pub fn transform(record: &SubmissionRecord, mode: TransformMode) -> TransformResult {
    let mut ctx = LoadContext::new(record, mode);
    let mut batch = DisseminationBatch {
        report_id: record.report_id().to_string(),
        ..Default::default()
    };

    let anchor = loaders::general(&mut ctx);

    for kind in LOAD_ORDER.into_iter().skip(1) {
        let Some(general) = anchor.as_ref() else {
            ctx.warn(TransformWarning::MissingAnchor { entity: kind });
            continue;
        };
        match kind {
            EntityKind::General => {}
            EntityKind::SecondaryAuditor => {
                batch.secondary_auditors = loaders::secondary_auditors(&mut ctx, general)
            }
            EntityKind::FederalAward => {
                batch.federal_awards = loaders::federal_awards(&mut ctx, general)
            }
            EntityKind::Finding => batch.findings = loaders::findings(&mut ctx, general),
            EntityKind::FindingText => {
                batch.findings_text = loaders::findings_text(&mut ctx, general)
            }
            EntityKind::Passthrough => {
                batch.passthroughs = loaders::passthroughs(&mut ctx, general)
            }
            EntityKind::CorrectiveActionText => {
                batch.corrective_action_texts = loaders::corrective_actions(&mut ctx, general)
            }
            EntityKind::Note => batch.notes = loaders::notes(&mut ctx, general),
            EntityKind::AdditionalUei => {
                batch.additional_ueis = loaders::additional_ueis(&mut ctx, general)
            }
            EntityKind::AdditionalEin => {
                batch.additional_eins = loaders::additional_eins(&mut ctx, general)
            }
        }
    }
    batch.general.extend(anchor);

    tracing::info!(
        report_id = %record.report_id(),
        mode = ?mode,
        rows = batch.total(),
        warnings = ctx.warnings.len(),
        "transform complete"
    );

    TransformResult {
        batch,
        warnings: ctx.warnings,
    }
}
