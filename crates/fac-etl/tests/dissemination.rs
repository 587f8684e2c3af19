//! End-to-end transform and dissemination over a realistic intake.

use std::sync::Arc;

use serde_json::{json, Value};

use fac_core::ReportId;
use fac_etl::{
    disseminate, preview, refresh_public_rows, transform, EntityKind, MemoryDisseminationStore,
    PipelineError, TransformMode, TransformWarning,
};
use fac_state::{
    resubmit, to_audit_document, to_legacy_document, IntakeSections, Lifecycle, MemorySink,
    SubmissionRecord, SubmissionStatus,
};

const ID: &str = "2023-06-GSAFAC-0000000001";

fn intake() -> IntakeSections {
    IntakeSections {
        general_information: Some(json!({
            "auditee_name": "Town of Example",
            "ein": "123456789",
            "auditee_uei": "ABCDEFGHJKLM",
            "auditee_fiscal_period_start": "2022-07-01",
            "auditee_fiscal_period_end": "2023-06-30",
            "audit_type": "single-audit",
            "audit_period_covered": "annual",
            "user_provided_organization_type": "local",
            "multiple_eins_covered": "Y",
            "multiple_ueis_covered": false,
            "secondary_auditors_exist": true,
            "auditor_firm_name": "Example CPAs",
            "auditor_country": "USA"
        })),
        audit_information: Some(json!({
            "gaap_results": ["unmodified_opinion", "adverse_opinion"],
            "is_going_concern_included": "N",
            "dollar_threshold": 750000,
            "is_low_risk_auditee": "Y",
            "agencies": ["10", "84"]
        })),
        federal_awards: Some(json!({"FederalAwards": {
            "auditee_uei": "ABCDEFGHJKLM",
            "total_amount_expended": 1_250_000,
            "federal_awards": [
                {
                    "award_reference": "AWARD-0001",
                    "program": {
                        "federal_agency_prefix": "10",
                        "three_digit_extension": "555",
                        "program_name": "School Lunch",
                        "amount_expended": 1_000_000,
                        "is_major": "Y",
                        "number_of_audit_findings": 1
                    },
                    "direct_or_indirect_award": {
                        "is_direct": "N",
                        "entities": [
                            {"passthrough_name": "State DOE", "passthrough_identifying_number": "SD-1"},
                            {"passthrough_name": "County", "passthrough_identifying_number": "C-9"}
                        ]
                    }
                },
                {
                    "award_reference": "AWARD-2",
                    "program": {"federal_agency_prefix": "84", "three_digit_extension": "010", "amount_expended": 250_000},
                    "direct_or_indirect_award": {"is_direct": "Y"}
                }
            ]
        }})),
        findings_uniform_guidance: Some(json!({"FindingsUniformGuidance": {
            "findings_uniform_guidance_entries": [{
                "program": {"award_reference": "AWARD-0001", "compliance_requirement": "AB"},
                "findings": {"reference_number": "2023-001", "repeat_prior_reference": "N", "prior_references": "N/A"},
                "material_weakness": "Y",
                "modified_opinion": "N"
            }]
        }})),
        notes_to_sefa: Some(json!({"NotesToSefa": {
            "accounting_policies": "Accrual basis",
            "is_minimis_rate_used": "Y",
            "rate_explained": "10 percent",
            "notes_to_sefa_entries": []
        }})),
        additional_eins: Some(json!({"AdditionalEINs": {
            "additional_eins_entries": [{"additional_ein": "987654321"}]
        }})),
        ..Default::default()
    }
}

fn record() -> SubmissionRecord {
    SubmissionRecord::new(ReportId::new(ID).unwrap(), "GSAFAC", intake())
}

fn submitted(machine: &Lifecycle) -> SubmissionRecord {
    let mut r = record();
    machine.lock_for_certification(&mut r, Some("auditor@example.gov")).unwrap();
    let auditor = json!({"auditor_signature": {"auditor_name": "Ann Auditor", "auditor_title": "Partner"}});
    machine.auditor_certify(&mut r, auditor, None).unwrap();
    let auditee = json!({"auditee_signature": {"auditee_name": "Ed Auditee", "auditee_title": "Clerk"}});
    machine.auditee_certify(&mut r, auditee, None).unwrap();
    machine.submit(&mut r, None).unwrap();
    r
}

// ── Transform ────────────────────────────────────────────────────────

#[test]
fn test_general_row_fields() {
    let machine = Lifecycle::new();
    let r = submitted(&machine);
    let result = transform(&r, TransformMode::Dissemination);
    let g = &result.batch.general[0];

    assert_eq!(g.report_id, ID);
    assert_eq!(g.auditee_name, "Town of Example");
    assert_eq!(g.auditee_ein, "123456789");
    assert!(g.is_multiple_eins);
    assert!(!g.is_additional_ueis);
    assert!(g.is_secondary_auditors);
    assert_eq!(g.gaap_results, "unmodified_opinion,adverse_opinion");
    assert_eq!(g.agencies_with_prior_findings, "10,84");
    assert!(g.is_low_risk_auditee);
    assert_eq!(g.dollar_threshold, Some(750000));
    assert_eq!(g.total_amount_expended, Some(1_250_000));
    assert_eq!(g.audit_year.as_deref(), Some("2023"));
    assert!(g.is_public);
    assert_eq!(g.auditor_certify_name.as_deref(), Some("Ann Auditor"));
    assert_eq!(g.auditee_certify_title.as_deref(), Some("Clerk"));
    assert!(g.submitted_date.is_some());
    assert_eq!(g.fac_accepted_date, g.submitted_date);
    assert_eq!(g.resubmission_version, 1);
    assert_eq!(g.resubmission_status, "ORIGINAL");
    assert_eq!(g.type_audit_code, "UG");
}

#[test]
fn test_award_rows_and_passthroughs() {
    let result = transform(&record(), TransformMode::Dissemination);
    let awards = &result.batch.federal_awards;
    assert_eq!(awards.len(), 2);
    assert_eq!(awards[0].award_reference, "AWARD-00001");
    assert_eq!(awards[1].award_reference, "AWARD-00002");
    assert_eq!(awards[0].aln, "10.555");
    assert!(awards[0].is_major);
    assert!(!awards[0].is_direct);
    assert!(awards[1].is_direct);
    assert_eq!(awards[0].findings_count, Some(1));

    let passthroughs = &result.batch.passthroughs;
    assert_eq!(passthroughs.len(), 2);
    assert!(passthroughs.iter().all(|p| p.award_reference == "AWARD-00001"));
    assert_eq!(passthroughs[1].passthrough_id, "C-9");
}

#[test]
fn test_findings_and_notes() {
    let result = transform(&record(), TransformMode::Dissemination);
    let finding = &result.batch.findings[0];
    assert_eq!(finding.award_reference, "AWARD-00001");
    assert_eq!(finding.reference_number, "2023-001");
    assert!(finding.is_material_weakness);
    assert!(!finding.is_repeat_finding);
    assert_eq!(finding.type_requirement, "AB");

    // No note entries: one row carries the policy fields.
    assert_eq!(result.batch.notes.len(), 1);
    assert_eq!(result.batch.notes[0].accounting_policies, "Accrual basis");
    assert_eq!(result.batch.additional_eins[0].additional_ein, "987654321");
}

#[test]
fn test_absent_sections_warn_without_failing() {
    let result = transform(&record(), TransformMode::Dissemination);
    assert!(result.batch.findings_text.is_empty());
    assert!(result.warnings.contains(&TransformWarning::SectionMissing {
        section: "findings_text",
        entity: EntityKind::FindingText,
    }));
    assert!(result.warnings.contains(&TransformWarning::SectionMissing {
        section: "additional_ueis",
        entity: EntityKind::AdditionalUei,
    }));
}

#[test]
fn test_absent_federal_awards_still_yields_general() {
    let mut r = record();
    r.edit_section("federal_awards", None).unwrap();
    let result = transform(&r, TransformMode::Dissemination);

    assert_eq!(result.batch.general.len(), 1);
    assert!(result.batch.federal_awards.is_empty());
    assert!(result.batch.passthroughs.is_empty());
    assert!(result.warnings.contains(&TransformWarning::SectionMissing {
        section: "federal_awards",
        entity: EntityKind::FederalAward,
    }));
    assert_eq!(result.batch.general[0].total_amount_expended, None);
}

#[test]
fn test_malformed_section_is_a_warning() {
    let mut r = record();
    r.edit_section("findings_text", Some(json!({"FindingsText": "oops"})))
        .unwrap();
    r.edit_section(
        "additional_ueis",
        Some(json!({"AdditionalUEIs": {"additional_ueis_entries": {"not": "a list"}}})),
    )
    .unwrap();
    let result = transform(&r, TransformMode::Dissemination);
    let malformed: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| matches!(w, TransformWarning::SectionMalformed { .. }))
        .collect();
    assert_eq!(malformed.len(), 2);
    assert_eq!(result.batch.general.len(), 1);
}

#[test]
fn test_missing_anchor_empties_only_downstream() {
    let mut r = record();
    r.edit_section("general_information", None).unwrap();
    let result = transform(&r, TransformMode::Dissemination);
    assert_eq!(result.batch.total(), 0);
    assert!(result
        .warnings
        .contains(&TransformWarning::MissingAnchor { entity: EntityKind::FederalAward }));
    let anchors = result
        .warnings
        .iter()
        .filter(|w| matches!(w, TransformWarning::MissingAnchor { .. }))
        .count();
    assert_eq!(anchors, 9);
}

#[test]
fn test_tribal_consent_controls_is_public() {
    let mut r = record();
    let mut gi = r.intake().general_information.clone().unwrap();
    gi["user_provided_organization_type"] = json!("tribal");
    r.edit_section("general_information", Some(gi)).unwrap();
    let hidden = transform(&r, TransformMode::Dissemination);
    assert!(!hidden.batch.general[0].is_public);

    r.edit_section(
        "tribal_data_consent",
        Some(json!({"is_tribal_information_authorized_to_be_public": true})),
    )
    .unwrap();
    let shown = transform(&r, TransformMode::Dissemination);
    assert!(shown.batch.general[0].is_public);
}

#[test]
fn test_preview_suppresses_certifier_fields() {
    let machine = Lifecycle::new();
    let r = submitted(&machine);
    let result = preview(&r);
    let g = &result.batch.general[0];
    assert!(g.auditor_certify_name.is_none());
    assert!(g.auditee_certify_name.is_none());
    assert!(g.auditor_certified_date.is_none());
    assert!(g.submitted_date.is_none());
    assert!(g.ready_for_certification_date.is_some());
}

// ── Pipeline ─────────────────────────────────────────────────────────

#[test]
fn test_disseminate_persists_and_transitions() {
    let legacy = Arc::new(MemorySink::new("legacy", to_legacy_document));
    let audit = Arc::new(MemorySink::new("audit", to_audit_document));
    let machine = Lifecycle::new().with_sink(legacy.clone()).with_sink(audit.clone());
    let store = MemoryDisseminationStore::new();
    let mut r = submitted(&machine);

    let report = disseminate(&machine, &mut r, &store, None).unwrap();
    assert_eq!(r.status(), SubmissionStatus::Disseminated);
    assert_eq!(report.counts[&EntityKind::General], 1);
    assert_eq!(report.counts[&EntityKind::FederalAward], 2);
    assert!(report.failed_sinks.is_empty());

    let rows = store.rows(EntityKind::FederalAward, ID);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row["hash"].as_str().map(str::len) == Some(40)));
    assert_eq!(legacy.document(ID).unwrap()["submission_status"], "disseminated");
    assert_eq!(audit.document(ID).unwrap()["submission_status"], "disseminated");
}

#[test]
fn test_disseminate_requires_submitted() {
    let machine = Lifecycle::new();
    let store = MemoryDisseminationStore::new();
    let mut r = record();
    let err = disseminate(&machine, &mut r, &store, None).unwrap_err();
    assert!(matches!(err, PipelineError::NotEligible { status: SubmissionStatus::InProgress, .. }));
    assert!(store.report(ID).tables.is_empty());
}

#[test]
fn test_disseminate_reports_persist_failures() {
    let machine = Lifecycle::new();
    let store = MemoryDisseminationStore::new().failing_on(EntityKind::Passthrough);
    let mut r = submitted(&machine);
    let report = disseminate(&machine, &mut r, &store, None).unwrap();
    assert!(!report.is_clean());
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, TransformWarning::PersistFailure { entity: EntityKind::Passthrough, .. })));
    assert_eq!(store.rows(EntityKind::FederalAward, ID).len(), 2);
    assert_eq!(r.status(), SubmissionStatus::Disseminated);
}

#[test]
fn test_disseminate_surfaces_partial_sink_write() {
    let machine = Lifecycle::new()
        .with_sink(MemorySink::new("legacy", to_legacy_document))
        .with_sink(MemorySink::failing("audit"));
    let mut r = submitted(&Lifecycle::new());
    let report = disseminate(&machine, &mut r, &MemoryDisseminationStore::new(), None).unwrap();
    assert_eq!(report.failed_sinks.len(), 1);
    assert_eq!(report.failed_sinks[0].sink, "audit");
}

#[test]
fn test_refresh_after_resubmission_deprecates_public_row() {
    let machine = Lifecycle::new();
    let store = MemoryDisseminationStore::new();
    let mut r = submitted(&machine);
    disseminate(&machine, &mut r, &store, None).unwrap();
    let before = store.rows(EntityKind::General, ID);
    assert_eq!(before[0]["resubmission_status"], "ORIGINAL");
    assert_eq!(before[0]["next_report_id"], Value::Null);

    let next_id = ReportId::new("2023-06-GSAFAC-0000000002").unwrap();
    resubmit(&machine, &mut r, next_id.clone(), None).unwrap();
    let report = refresh_public_rows(&r, &store).unwrap();
    assert!(report.failed_sinks.is_empty());
    assert_eq!(report.counts[&EntityKind::General], 1);

    let after = store.rows(EntityKind::General, ID);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0]["resubmission_status"], "DEPRECATED");
    assert_eq!(after[0]["next_report_id"], next_id.as_str());
    assert_eq!(store.rows(EntityKind::FederalAward, ID).len(), 2);
    assert_eq!(r.status(), SubmissionStatus::Resubmitted);
}

#[test]
fn test_refresh_requires_public_record() {
    let machine = Lifecycle::new();
    let store = MemoryDisseminationStore::new();
    let r = submitted(&machine);
    let err = refresh_public_rows(&r, &store).unwrap_err();
    assert!(matches!(err, PipelineError::NotPublished { status: SubmissionStatus::Submitted, .. }));
    assert!(store.report(ID).tables.is_empty());
}

#[test]
fn test_report_serializes() {
    let machine = Lifecycle::new();
    let mut r = submitted(&machine);
    let report = disseminate(&machine, &mut r, &MemoryDisseminationStore::new(), None).unwrap();
    let value: Value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["counts"]["General"], 1);
}
