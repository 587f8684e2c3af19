//! # Dissemination Entities
//!
//! The flat public rows produced from one intake. Field names match the
//! public dissemination tables and the hash allow-lists in
//! `fac-core/data/hash_fields.json`; renaming a field here silently drops it
//! from the hash.
//!
//! Every row carries `report_id`, a lookup key into its anchor [`General`]
//! row, and `hash`, empty until the persist phase stamps it.

use serde::{Deserialize, Serialize};

use fac_core::{entity_hash, HashError};

/// The dissemination entity types, in loader order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    General,
    SecondaryAuditor,
    FederalAward,
    Finding,
    FindingText,
    Passthrough,
    CorrectiveActionText,
    Note,
    AdditionalUei,
    AdditionalEin,
}

/// Loader order. General is the anchor and always runs first.
pub const LOAD_ORDER: [EntityKind; 10] = [
    EntityKind::General,
    EntityKind::SecondaryAuditor,
    EntityKind::FederalAward,
    EntityKind::Finding,
    EntityKind::FindingText,
    EntityKind::Passthrough,
    EntityKind::CorrectiveActionText,
    EntityKind::Note,
    EntityKind::AdditionalUei,
    EntityKind::AdditionalEin,
];

impl EntityKind {
    /// Type name used as the hash contract key and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::SecondaryAuditor => "SecondaryAuditor",
            Self::FederalAward => "FederalAward",
            Self::Finding => "Finding",
            Self::FindingText => "FindingText",
            Self::Passthrough => "Passthrough",
            Self::CorrectiveActionText => "CorrectiveActionText",
            Self::Note => "Note",
            Self::AdditionalUei => "AdditionalUei",
            Self::AdditionalEin => "AdditionalEin",
        }
    }

    /// Public table name, e.g. `dissemination_federalaward`.
    pub fn table(&self) -> String {
        format!("dissemination_{}", self.as_str().to_ascii_lowercase())
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row type that can be hashed and persisted.
pub trait Disseminated: Serialize {
    /// Entity type of this row.
    const KIND: EntityKind;

    /// Report the row belongs to.
    fn report_id(&self) -> &str;

    /// The stamped hash, if any.
    fn hash(&self) -> Option<&str>;

    /// Overwrite the hash column.
    fn set_hash(&mut self, hash: String);

    /// Compute the canonical hash from the row's allow-listed fields and
    /// store it.
    fn stamp_hash(&mut self) -> Result<(), HashError>
    where
        Self: Sized,
    {
        let digest = entity_hash(Self::KIND.as_str(), &*self)?;
        self.set_hash(digest);
        Ok(())
    }
}

macro_rules! disseminated {
    ($($ty:ident),+ $(,)?) => {$(
        impl Disseminated for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn report_id(&self) -> &str {
                &self.report_id
            }

            fn hash(&self) -> Option<&str> {
                self.hash.as_deref()
            }

            fn set_hash(&mut self, hash: String) {
                self.hash = Some(hash);
            }
        }
    )+};
}

disseminated!(
    General,
    SecondaryAuditor,
    FederalAward,
    Finding,
    FindingText,
    Passthrough,
    CorrectiveActionText,
    Note,
    AdditionalUei,
    AdditionalEin,
);

// ─── General ─────────────────────────────────────────────────────────

/// The anchor row: one per report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct General {
    pub report_id: String,
    pub hash: Option<String>,

    // Auditee
    pub auditee_name: String,
    pub auditee_ein: String,
    pub auditee_uei: String,
    pub auditee_contact_name: String,
    pub auditee_contact_title: String,
    pub auditee_email: String,
    pub auditee_phone: String,
    pub auditee_address_line_1: String,
    pub auditee_city: String,
    pub auditee_state: String,
    pub auditee_zip: String,
    pub is_additional_ueis: bool,
    pub is_multiple_eins: bool,

    // Auditor
    pub auditor_firm_name: String,
    pub auditor_ein: String,
    pub auditor_contact_name: String,
    pub auditor_contact_title: String,
    pub auditor_email: String,
    pub auditor_phone: String,
    pub auditor_address_line_1: String,
    pub auditor_city: String,
    pub auditor_state: String,
    pub auditor_zip: String,
    pub auditor_country: String,
    pub auditor_foreign_address: String,
    pub is_secondary_auditors: bool,

    // Certification
    pub auditee_certify_name: Option<String>,
    pub auditee_certify_title: Option<String>,
    pub auditor_certify_name: Option<String>,
    pub auditor_certify_title: Option<String>,

    // Lifecycle dates, display zone
    pub date_created: String,
    pub ready_for_certification_date: Option<String>,
    pub auditor_certified_date: Option<String>,
    pub auditee_certified_date: Option<String>,
    pub submitted_date: Option<String>,
    pub fac_accepted_date: Option<String>,

    // Audit period
    pub fy_start_date: String,
    pub fy_end_date: String,
    pub audit_year: Option<String>,
    pub audit_type: String,
    pub audit_period_covered: String,
    pub number_months: String,
    pub entity_type: String,
    pub type_audit_code: String,

    // Audit information
    pub gaap_results: String,
    pub sp_framework_basis: String,
    pub is_sp_framework_required: bool,
    pub sp_framework_opinions: String,
    pub is_going_concern_included: bool,
    pub is_internal_control_deficiency_disclosed: bool,
    pub is_internal_control_material_weakness_disclosed: bool,
    pub is_material_noncompliance_disclosed: bool,
    pub is_aicpa_audit_guide_included: bool,
    pub dollar_threshold: Option<i64>,
    pub is_low_risk_auditee: bool,
    pub agencies_with_prior_findings: String,
    pub total_amount_expended: Option<i64>,

    pub cognizant_agency: Option<String>,
    pub oversight_agency: Option<String>,
    pub is_public: bool,
    pub data_source: String,

    // Resubmission chain
    pub resubmission_version: u32,
    pub resubmission_status: String,
    pub previous_report_id: Option<String>,
    pub next_report_id: Option<String>,
}

// ─── Awards ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederalAward {
    pub report_id: String,
    pub hash: Option<String>,
    pub award_reference: String,
    pub federal_agency_prefix: String,
    pub federal_award_extension: String,
    /// `prefix.extension`. Derived, not hashed.
    pub aln: String,
    pub additional_award_identification: String,
    pub federal_program_name: String,
    pub amount_expended: Option<i64>,
    pub cluster_name: String,
    pub other_cluster_name: String,
    pub state_cluster_name: String,
    pub cluster_total: Option<i64>,
    pub federal_program_total: Option<i64>,
    pub is_major: bool,
    pub is_loan: bool,
    pub loan_balance: String,
    pub is_direct: bool,
    pub audit_report_type: String,
    pub findings_count: Option<i64>,
    pub is_passthrough_award: bool,
    pub passthrough_amount: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passthrough {
    pub report_id: String,
    pub hash: Option<String>,
    pub award_reference: String,
    pub passthrough_id: String,
    pub passthrough_name: String,
}

// ─── Findings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub report_id: String,
    pub hash: Option<String>,
    pub award_reference: String,
    pub reference_number: String,
    pub is_material_weakness: bool,
    pub is_modified_opinion: bool,
    pub is_other_findings: bool,
    pub is_other_matters: bool,
    pub prior_finding_ref_numbers: String,
    pub is_questioned_costs: bool,
    pub is_repeat_finding: bool,
    pub is_significant_deficiency: bool,
    pub type_requirement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingText {
    pub report_id: String,
    pub hash: Option<String>,
    pub finding_ref_number: String,
    pub contains_chart_or_table: bool,
    pub finding_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectiveActionText {
    pub report_id: String,
    pub hash: Option<String>,
    pub finding_ref_number: String,
    pub contains_chart_or_table: bool,
    pub planned_action: String,
}

// ─── Notes and auditors ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub report_id: String,
    pub hash: Option<String>,
    pub note_title: String,
    pub content: String,
    pub contains_chart_or_table: bool,
    pub accounting_policies: String,
    pub is_minimis_rate_used: String,
    pub rate_explained: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryAuditor {
    pub report_id: String,
    pub hash: Option<String>,
    pub auditor_name: String,
    pub auditor_ein: String,
    pub address_street: String,
    pub address_city: String,
    pub address_state: String,
    pub address_zipcode: String,
    pub contact_name: String,
    pub contact_title: String,
    pub contact_email: String,
    pub contact_phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalUei {
    pub report_id: String,
    pub hash: Option<String>,
    pub additional_uei: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalEin {
    pub report_id: String,
    pub hash: Option<String>,
    pub additional_ein: String,
}
