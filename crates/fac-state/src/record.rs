//! # Submission Record
//!
//! One record per audit engagement. The record owns the intake sections,
//! the two certification payloads, the append-only transition history and
//! the resubmission links.
//!
//! ## Invariants
//!
//! - The current status is always the status of the last history entry.
//!   There is no separately stored status to drift from it.
//! - History entries are only ever appended, and only by
//!   [`crate::lifecycle::Lifecycle`].
//! - Intake sections are editable only while the record is IN_PROGRESS.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fac_core::{ReportId, Timestamp};

use crate::lifecycle::LifecycleError;
use crate::resubmission::ResubmissionMeta;
use crate::status::SubmissionStatus;

/// Names of the intake sections, in the order they appear on the form.
pub const SECTION_NAMES: [&str; 11] = [
    "general_information",
    "audit_information",
    "federal_awards",
    "findings_uniform_guidance",
    "findings_text",
    "corrective_action_plan",
    "notes_to_sefa",
    "secondary_auditors",
    "additional_ueis",
    "additional_eins",
    "tribal_data_consent",
];

/// The named nested documents that make up an intake.
///
/// Section contents are opaque here: validation happens upstream, and the
/// transform reads only the keys it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeSections {
    #[serde(default)]
    pub general_information: Option<Value>,
    #[serde(default)]
    pub audit_information: Option<Value>,
    #[serde(default)]
    pub federal_awards: Option<Value>,
    #[serde(default)]
    pub findings_uniform_guidance: Option<Value>,
    #[serde(default)]
    pub findings_text: Option<Value>,
    #[serde(default)]
    pub corrective_action_plan: Option<Value>,
    #[serde(default)]
    pub notes_to_sefa: Option<Value>,
    #[serde(default)]
    pub secondary_auditors: Option<Value>,
    #[serde(default)]
    pub additional_ueis: Option<Value>,
    #[serde(default)]
    pub additional_eins: Option<Value>,
    #[serde(default)]
    pub tribal_data_consent: Option<Value>,
}

impl IntakeSections {
    /// Borrow a section by name. `None` for unknown names and absent sections.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slot(name).and_then(Option::as_ref)
    }

    fn slot(&self, name: &str) -> Option<&Option<Value>> {
        Some(match name {
            "general_information" => &self.general_information,
            "audit_information" => &self.audit_information,
            "federal_awards" => &self.federal_awards,
            "findings_uniform_guidance" => &self.findings_uniform_guidance,
            "findings_text" => &self.findings_text,
            "corrective_action_plan" => &self.corrective_action_plan,
            "notes_to_sefa" => &self.notes_to_sefa,
            "secondary_auditors" => &self.secondary_auditors,
            "additional_ueis" => &self.additional_ueis,
            "additional_eins" => &self.additional_eins,
            "tribal_data_consent" => &self.tribal_data_consent,
            _ => return None,
        })
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Option<Value>> {
        Some(match name {
            "general_information" => &mut self.general_information,
            "audit_information" => &mut self.audit_information,
            "federal_awards" => &mut self.federal_awards,
            "findings_uniform_guidance" => &mut self.findings_uniform_guidance,
            "findings_text" => &mut self.findings_text,
            "corrective_action_plan" => &mut self.corrective_action_plan,
            "notes_to_sefa" => &mut self.notes_to_sefa,
            "secondary_auditors" => &mut self.secondary_auditors,
            "additional_ueis" => &mut self.additional_ueis,
            "additional_eins" => &mut self.additional_eins,
            "tribal_data_consent" => &mut self.tribal_data_consent,
            _ => return None,
        })
    }

    /// Iterate over present sections as `(name, document)`.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        SECTION_NAMES
            .into_iter()
            .filter_map(move |name| self.get(name).map(|v| (name, v)))
    }
}

/// One entry of the transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEntry {
    /// Status entered.
    pub status: SubmissionStatus,
    /// When it was entered.
    pub timestamp: Timestamp,
    /// Acting user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A submission and everything the core tracks about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    report_id: ReportId,
    history: Vec<TransitionEntry>,
    intake: IntakeSections,
    #[serde(default)]
    auditor_certification: Option<Value>,
    #[serde(default)]
    auditee_certification: Option<Value>,
    /// Cognizant federal agency, assigned outside the core.
    #[serde(default)]
    pub cognizant_agency: Option<String>,
    /// Oversight federal agency, assigned outside the core.
    #[serde(default)]
    pub oversight_agency: Option<String>,
    /// Resubmission links and derived status.
    #[serde(default)]
    pub resubmission: ResubmissionMeta,
    /// Origin of the data (`GSAFAC`, `CENSUS`, ...).
    pub data_source: String,
    date_created: Timestamp,
}

impl SubmissionRecord {
    /// Start a new intake. The history opens with IN_PROGRESS.
    pub fn new(report_id: ReportId, data_source: impl Into<String>, intake: IntakeSections) -> Self {
        let now = Timestamp::now();
        Self {
            report_id,
            history: vec![TransitionEntry {
                status: SubmissionStatus::InProgress,
                timestamp: now,
                user: None,
            }],
            intake,
            auditor_certification: None,
            auditee_certification: None,
            cognizant_agency: None,
            oversight_agency: None,
            resubmission: ResubmissionMeta::original(),
            data_source: data_source.into(),
            date_created: now,
        }
    }

    /// The immutable report identifier.
    pub fn report_id(&self) -> &ReportId {
        &self.report_id
    }

    /// Current status, read from the last history entry.
    pub fn status(&self) -> SubmissionStatus {
        self.history
            .last()
            .map(|entry| entry.status)
            .unwrap_or(SubmissionStatus::InProgress)
    }

    /// The full transition history, oldest first.
    pub fn history(&self) -> &[TransitionEntry] {
        &self.history
    }

    /// Timestamp of the first time the record entered `status`.
    pub fn first_entered(&self, status: SubmissionStatus) -> Option<Timestamp> {
        self.history
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.timestamp)
    }

    /// The intake sections.
    pub fn intake(&self) -> &IntakeSections {
        &self.intake
    }

    /// The auditor certification payload, once certified.
    pub fn auditor_certification(&self) -> Option<&Value> {
        self.auditor_certification.as_ref()
    }

    /// The auditee certification payload, once certified.
    pub fn auditee_certification(&self) -> Option<&Value> {
        self.auditee_certification.as_ref()
    }

    /// When the intake was started.
    pub fn date_created(&self) -> Timestamp {
        self.date_created
    }

    /// Replace one intake section.
    ///
    /// # Errors
    ///
    /// `LifecycleError::Locked` unless IN_PROGRESS;
    /// `LifecycleError::UnknownSection` for names outside [`SECTION_NAMES`].
    pub fn edit_section(&mut self, name: &str, value: Option<Value>) -> Result<(), LifecycleError> {
        let status = self.status();
        if !status.is_editable() {
            return Err(LifecycleError::Locked {
                report_id: self.report_id.to_string(),
                status,
            });
        }
        let slot = self
            .intake
            .slot_mut(name)
            .ok_or_else(|| LifecycleError::UnknownSection(name.to_string()))?;
        *slot = value;
        Ok(())
    }

    pub(crate) fn push_history(&mut self, entry: TransitionEntry) {
        self.history.push(entry);
    }

    pub(crate) fn set_auditor_certification(&mut self, payload: Option<Value>) {
        self.auditor_certification = payload;
    }

    pub(crate) fn set_auditee_certification(&mut self, payload: Option<Value>) {
        self.auditee_certification = payload;
    }

    /// A fresh IN_PROGRESS copy of this record's intake under a new id.
    /// Certifications, history and links are not carried over.
    pub(crate) fn fork_intake(&self, report_id: ReportId) -> Self {
        let mut fork = Self::new(report_id, self.data_source.clone(), self.intake.clone());
        fork.cognizant_agency = self.cognizant_agency.clone();
        fork.oversight_agency = self.oversight_agency.clone();
        fork
    }
}
