//! Per-section loaders. Each maps one intake section to one entity type.
//!
//! Key names on the right-hand side are the intake workbook keys; names on
//! the left are the public table columns.

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use fac_state::{SubmissionRecord, SubmissionStatus};

use crate::coerce::{amount, at, award_reference, join, opt_text, text, yes_no};
use crate::entities::{
    AdditionalEin, AdditionalUei, CorrectiveActionText, EntityKind, FederalAward, Finding,
    FindingText, General, Note, Passthrough, SecondaryAuditor,
};
use crate::transform::{LoadContext, TransformWarning};

const TRIBAL_ORGANIZATION: &str = "tribal";
const TYPE_AUDIT_CODE: &str = "UG";

fn status_date(record: &SubmissionRecord, status: SubmissionStatus) -> Option<String> {
    record.first_entered(status).map(|t| t.display_date())
}

fn audit_year(fy_end: &str) -> Option<String> {
    fy_end
        .get(..10)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .map(|d| d.year().to_string())
}

// ─── General ─────────────────────────────────────────────────────────

/// Build the anchor row. `None` when `general_information` is unusable.
pub(crate) fn general(ctx: &mut LoadContext<'_>) -> Option<General> {
    let gi = ctx.section("general_information", None, EntityKind::General)?;
    let record = ctx.record;
    let certify = ctx.mode.includes_certification();

    let null = Value::Null;
    let ai = match record.intake().get("audit_information") {
        Some(v) if v.is_object() => v,
        Some(_) => {
            ctx.warn(TransformWarning::SectionMalformed {
                section: "audit_information",
                entity: EntityKind::General,
                detail: "expected object".to_string(),
            });
            &null
        }
        None => {
            ctx.warn(TransformWarning::SectionMissing {
                section: "audit_information",
                entity: EntityKind::General,
            });
            &null
        }
    };

    let auditor_cert = record.auditor_certification().unwrap_or(&null);
    let auditee_cert = record.auditee_certification().unwrap_or(&null);

    let g = |key: &str| text(gi.get(key));
    let fy_end_date = g("auditee_fiscal_period_end");
    let entity_type = g("user_provided_organization_type");
    let tribal_consent = record
        .intake()
        .get("tribal_data_consent")
        .and_then(|v| v.get("is_tribal_information_authorized_to_be_public"));
    let is_public = entity_type != TRIBAL_ORGANIZATION || yes_no(tribal_consent);
    let total_amount_expended = record
        .intake()
        .get("federal_awards")
        .and_then(|fa| at(fa, &["FederalAwards", "total_amount_expended"]));

    let submitted_date = status_date(record, SubmissionStatus::Submitted).filter(|_| certify);
    let chain = &record.resubmission;

    Some(General {
        report_id: record.report_id().to_string(),
        hash: None,

        auditee_name: g("auditee_name"),
        auditee_ein: g("ein"),
        auditee_uei: g("auditee_uei"),
        auditee_contact_name: g("auditee_contact_name"),
        auditee_contact_title: g("auditee_contact_title"),
        auditee_email: g("auditee_email"),
        auditee_phone: g("auditee_phone"),
        auditee_address_line_1: g("auditee_address_line_1"),
        auditee_city: g("auditee_city"),
        auditee_state: g("auditee_state"),
        auditee_zip: g("auditee_zip"),
        is_additional_ueis: yes_no(gi.get("multiple_ueis_covered")),
        is_multiple_eins: yes_no(gi.get("multiple_eins_covered")),

        auditor_firm_name: g("auditor_firm_name"),
        auditor_ein: g("auditor_ein"),
        auditor_contact_name: g("auditor_contact_name"),
        auditor_contact_title: g("auditor_contact_title"),
        auditor_email: g("auditor_email"),
        auditor_phone: g("auditor_phone"),
        auditor_address_line_1: g("auditor_address_line_1"),
        auditor_city: g("auditor_city"),
        auditor_state: g("auditor_state"),
        auditor_zip: g("auditor_zip"),
        auditor_country: g("auditor_country"),
        auditor_foreign_address: g("auditor_international_address"),
        is_secondary_auditors: yes_no(gi.get("secondary_auditors_exist")),

        auditee_certify_name: opt_text(at(auditee_cert, &["auditee_signature", "auditee_name"]))
            .filter(|_| certify),
        auditee_certify_title: opt_text(at(auditee_cert, &["auditee_signature", "auditee_title"]))
            .filter(|_| certify),
        auditor_certify_name: opt_text(at(auditor_cert, &["auditor_signature", "auditor_name"]))
            .filter(|_| certify),
        auditor_certify_title: opt_text(at(auditor_cert, &["auditor_signature", "auditor_title"]))
            .filter(|_| certify),

        date_created: record.date_created().display_date(),
        ready_for_certification_date: status_date(record, SubmissionStatus::ReadyForCertification),
        auditor_certified_date: status_date(record, SubmissionStatus::AuditorCertified)
            .filter(|_| certify),
        auditee_certified_date: status_date(record, SubmissionStatus::AuditeeCertified)
            .filter(|_| certify),
        fac_accepted_date: submitted_date.clone(),
        submitted_date,

        fy_start_date: g("auditee_fiscal_period_start"),
        audit_year: audit_year(&fy_end_date),
        fy_end_date,
        audit_type: g("audit_type"),
        audit_period_covered: g("audit_period_covered"),
        number_months: g("audit_period_other_months"),
        entity_type,
        type_audit_code: TYPE_AUDIT_CODE.to_string(),

        gaap_results: join(ai.get("gaap_results")),
        sp_framework_basis: join(ai.get("sp_framework_basis")),
        is_sp_framework_required: yes_no(ai.get("is_sp_framework_required")),
        sp_framework_opinions: join(ai.get("sp_framework_opinions")),
        is_going_concern_included: yes_no(ai.get("is_going_concern_included")),
        is_internal_control_deficiency_disclosed: yes_no(
            ai.get("is_internal_control_deficiency_disclosed"),
        ),
        is_internal_control_material_weakness_disclosed: yes_no(
            ai.get("is_internal_control_material_weakness_disclosed"),
        ),
        is_material_noncompliance_disclosed: yes_no(ai.get("is_material_noncompliance_disclosed")),
        is_aicpa_audit_guide_included: yes_no(ai.get("is_aicpa_audit_guide_included")),
        dollar_threshold: amount(ai.get("dollar_threshold")),
        is_low_risk_auditee: yes_no(ai.get("is_low_risk_auditee")),
        agencies_with_prior_findings: join(ai.get("agencies")),
        total_amount_expended: amount(total_amount_expended),

        cognizant_agency: record.cognizant_agency.clone(),
        oversight_agency: record.oversight_agency.clone(),
        is_public,
        data_source: record.data_source.clone(),

        resubmission_version: chain.version,
        resubmission_status: chain.status().to_string(),
        previous_report_id: chain.previous_report_id.as_ref().map(ToString::to_string),
        next_report_id: chain.next_report_id.as_ref().map(ToString::to_string),
    })
}

// ─── Awards ──────────────────────────────────────────────────────────

fn award_entries<'a>(ctx: &mut LoadContext<'a>, entity: EntityKind) -> &'a [Value] {
    match ctx.section("federal_awards", Some("FederalAwards"), entity) {
        Some(body) => ctx.entries(body, "federal_awards", "federal_awards", entity),
        None => &[],
    }
}

pub(crate) fn federal_awards(ctx: &mut LoadContext<'_>, anchor: &General) -> Vec<FederalAward> {
    award_entries(ctx, EntityKind::FederalAward)
        .iter()
        .map(|e| {
            let p = |key: &str| at(e, &["program", key]);
            let prefix = text(p("federal_agency_prefix"));
            let extension = text(p("three_digit_extension"));
            FederalAward {
                report_id: anchor.report_id.clone(),
                hash: None,
                award_reference: award_reference(&text(e.get("award_reference"))),
                aln: format!("{prefix}.{extension}"),
                federal_agency_prefix: prefix,
                federal_award_extension: extension,
                additional_award_identification: text(p("additional_award_identification")),
                federal_program_name: text(p("program_name")),
                amount_expended: amount(p("amount_expended")),
                cluster_name: text(at(e, &["cluster", "cluster_name"])),
                other_cluster_name: text(at(e, &["cluster", "other_cluster_name"])),
                state_cluster_name: text(at(e, &["cluster", "state_cluster_name"])),
                cluster_total: amount(at(e, &["cluster", "cluster_total"])),
                federal_program_total: amount(p("federal_program_total")),
                is_major: yes_no(p("is_major")),
                is_loan: yes_no(at(e, &["loan_or_loan_guarantee", "is_guaranteed"])),
                loan_balance: text(at(
                    e,
                    &["loan_or_loan_guarantee", "loan_balance_at_audit_period_end"],
                )),
                is_direct: yes_no(at(e, &["direct_or_indirect_award", "is_direct"])),
                audit_report_type: text(p("audit_report_type")),
                findings_count: amount(p("number_of_audit_findings")),
                is_passthrough_award: yes_no(at(e, &["subrecipients", "is_passed"])),
                passthrough_amount: amount(at(e, &["subrecipients", "subrecipient_amount"])),
            }
        })
        .collect()
}

pub(crate) fn passthroughs(ctx: &mut LoadContext<'_>, anchor: &General) -> Vec<Passthrough> {
    award_entries(ctx, EntityKind::Passthrough)
        .iter()
        .flat_map(|e| {
            let reference = award_reference(&text(e.get("award_reference")));
            at(e, &["direct_or_indirect_award", "entities"])
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(move |entity| Passthrough {
                    report_id: anchor.report_id.clone(),
                    hash: None,
                    award_reference: reference.clone(),
                    passthrough_id: text(entity.get("passthrough_identifying_number")),
                    passthrough_name: text(entity.get("passthrough_name")),
                })
        })
        .collect()
}

// ─── Findings ────────────────────────────────────────────────────────

pub(crate) fn findings(ctx: &mut LoadContext<'_>, anchor: &General) -> Vec<Finding> {
    const SECTION: &str = "findings_uniform_guidance";
    let Some(body) = ctx.section(SECTION, Some("FindingsUniformGuidance"), EntityKind::Finding)
    else {
        return Vec::new();
    };
    ctx.entries(body, "findings_uniform_guidance_entries", SECTION, EntityKind::Finding)
        .iter()
        .map(|e| Finding {
            report_id: anchor.report_id.clone(),
            hash: None,
            award_reference: award_reference(&text(at(e, &["program", "award_reference"]))),
            reference_number: text(at(e, &["findings", "reference_number"])),
            is_material_weakness: yes_no(e.get("material_weakness")),
            is_modified_opinion: yes_no(e.get("modified_opinion")),
            is_other_findings: yes_no(e.get("other_findings")),
            is_other_matters: yes_no(e.get("other_matters")),
            prior_finding_ref_numbers: join(at(e, &["findings", "prior_references"])),
            is_questioned_costs: yes_no(e.get("questioned_costs")),
            is_repeat_finding: yes_no(at(e, &["findings", "repeat_prior_reference"])),
            is_significant_deficiency: yes_no(e.get("significant_deficiency")),
            type_requirement: text(at(e, &["program", "compliance_requirement"])),
        })
        .collect()
}

pub(crate) fn findings_text(ctx: &mut LoadContext<'_>, anchor: &General) -> Vec<FindingText> {
    const SECTION: &str = "findings_text";
    let Some(body) = ctx.section(SECTION, Some("FindingsText"), EntityKind::FindingText) else {
        return Vec::new();
    };
    ctx.entries(body, "findings_text_entries", SECTION, EntityKind::FindingText)
        .iter()
        .map(|e| FindingText {
            report_id: anchor.report_id.clone(),
            hash: None,
            finding_ref_number: text(e.get("reference_number")),
            contains_chart_or_table: yes_no(e.get("contains_chart_or_table")),
            finding_text: text(e.get("text_of_finding")),
        })
        .collect()
}

pub(crate) fn corrective_actions(
    ctx: &mut LoadContext<'_>,
    anchor: &General,
) -> Vec<CorrectiveActionText> {
    const SECTION: &str = "corrective_action_plan";
    let kind = EntityKind::CorrectiveActionText;
    let Some(body) = ctx.section(SECTION, Some("CorrectiveActionPlan"), kind) else {
        return Vec::new();
    };
    ctx.entries(body, "corrective_action_plan_entries", SECTION, kind)
        .iter()
        .map(|e| CorrectiveActionText {
            report_id: anchor.report_id.clone(),
            hash: None,
            finding_ref_number: text(e.get("reference_number")),
            contains_chart_or_table: yes_no(e.get("contains_chart_or_table")),
            planned_action: text(e.get("planned_action")),
        })
        .collect()
}

// ─── Notes ───────────────────────────────────────────────────────────

/// Note rows. The section-level policy fields repeat on every row; with no
/// entries, one row carries them alone.
pub(crate) fn notes(ctx: &mut LoadContext<'_>, anchor: &General) -> Vec<Note> {
    const SECTION: &str = "notes_to_sefa";
    let Some(body) = ctx.section(SECTION, Some("NotesToSefa"), EntityKind::Note) else {
        return Vec::new();
    };
    let base = Note {
        report_id: anchor.report_id.clone(),
        hash: None,
        accounting_policies: text(body.get("accounting_policies")),
        is_minimis_rate_used: text(body.get("is_minimis_rate_used")),
        rate_explained: text(body.get("rate_explained")),
        ..Default::default()
    };
    let entries = ctx.entries(body, "notes_to_sefa_entries", SECTION, EntityKind::Note);
    if entries.is_empty() {
        return vec![base];
    }
    entries
        .iter()
        .map(|e| Note {
            note_title: text(e.get("note_title")),
            content: text(e.get("note_content")),
            contains_chart_or_table: yes_no(e.get("contains_chart_or_table")),
            ..base.clone()
        })
        .collect()
}

// ─── Auditors and identifiers ────────────────────────────────────────

pub(crate) fn secondary_auditors(
    ctx: &mut LoadContext<'_>,
    anchor: &General,
) -> Vec<SecondaryAuditor> {
    const SECTION: &str = "secondary_auditors";
    let kind = EntityKind::SecondaryAuditor;
    let Some(body) = ctx.section(SECTION, Some("SecondaryAuditors"), kind) else {
        return Vec::new();
    };
    ctx.entries(body, "secondary_auditors_entries", SECTION, kind)
        .iter()
        .map(|e| {
            let s = |key: &str| text(e.get(format!("secondary_auditor_{key}").as_str()));
            SecondaryAuditor {
                report_id: anchor.report_id.clone(),
                hash: None,
                auditor_name: s("name"),
                auditor_ein: s("ein"),
                address_street: s("address_street"),
                address_city: s("address_city"),
                address_state: s("address_state"),
                address_zipcode: s("address_zipcode"),
                contact_name: s("contact_name"),
                contact_title: s("contact_title"),
                contact_email: s("contact_email"),
                contact_phone: s("contact_phone"),
            }
        })
        .collect()
}

pub(crate) fn additional_ueis(ctx: &mut LoadContext<'_>, anchor: &General) -> Vec<AdditionalUei> {
    const SECTION: &str = "additional_ueis";
    let kind = EntityKind::AdditionalUei;
    let Some(body) = ctx.section(SECTION, Some("AdditionalUEIs"), kind) else {
        return Vec::new();
    };
    ctx.entries(body, "additional_ueis_entries", SECTION, kind)
        .iter()
        .map(|e| AdditionalUei {
            report_id: anchor.report_id.clone(),
            hash: None,
            additional_uei: text(e.get("additional_uei")),
        })
        .collect()
}

pub(crate) fn additional_eins(ctx: &mut LoadContext<'_>, anchor: &General) -> Vec<AdditionalEin> {
    const SECTION: &str = "additional_eins";
    let kind = EntityKind::AdditionalEin;
    let Some(body) = ctx.section(SECTION, Some("AdditionalEINs"), kind) else {
        return Vec::new();
    };
    ctx.entries(body, "additional_eins_entries", SECTION, kind)
        .iter()
        .map(|e| AdditionalEin {
            report_id: anchor.report_id.clone(),
            hash: None,
            additional_ein: text(e.get("additional_ein")),
        })
        .collect()
}
