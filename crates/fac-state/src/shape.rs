//! # Storage Shapes
//!
//! The two representations a record is stored in while the migration runs:
//!
//! - **Legacy**: one flat row: status column, parallel
//!   `transition_name` / `transition_date` arrays, one column per intake
//!   section holding the section exactly as uploaded.
//! - **Audit**: one nested JSON document: `history` as a list of objects,
//!   sections under `audit` with the spreadsheet wrapper key stripped
//!   (`{"FederalAwards": {...}}` becomes `{...}`).
//!
//! The consistency checker compares these two documents.

use serde_json::{json, Map, Value};

use crate::record::{SubmissionRecord, SECTION_NAMES};

/// Render the flat legacy row.
pub fn to_legacy_document(record: &SubmissionRecord) -> Value {
    let mut doc = Map::new();
    doc.insert("report_id".into(), json!(record.report_id().as_str()));
    doc.insert("submission_status".into(), json!(record.status().as_str()));
    doc.insert(
        "transition_name".into(),
        record
            .history()
            .iter()
            .map(|e| json!(e.status.as_str()))
            .collect(),
    );
    doc.insert(
        "transition_date".into(),
        record
            .history()
            .iter()
            .map(|e| json!(e.timestamp.to_iso8601()))
            .collect(),
    );
    doc.insert("data_source".into(), json!(record.data_source));
    doc.insert("date_created".into(), json!(record.date_created().to_iso8601()));
    doc.insert("cognizant_agency".into(), json!(record.cognizant_agency));
    doc.insert("oversight_agency".into(), json!(record.oversight_agency));
    for name in SECTION_NAMES {
        doc.insert(name.into(), record.intake().get(name).cloned().unwrap_or(Value::Null));
    }
    doc.insert(
        "auditor_certification".into(),
        record.auditor_certification().cloned().unwrap_or(Value::Null),
    );
    doc.insert(
        "auditee_certification".into(),
        record.auditee_certification().cloned().unwrap_or(Value::Null),
    );
    doc.insert(
        "resubmission_meta".into(),
        serde_json::to_value(&record.resubmission).unwrap_or(Value::Null),
    );
    Value::Object(doc)
}

/// Render the nested audit document.
pub fn to_audit_document(record: &SubmissionRecord) -> Value {
    let mut audit = Map::new();
    for (name, section) in record.intake().present() {
        audit.insert(name.into(), unwrap_section(section));
    }
    if let Some(cert) = record.auditor_certification() {
        audit.insert("auditor_certification".into(), cert.clone());
    }
    if let Some(cert) = record.auditee_certification() {
        audit.insert("auditee_certification".into(), cert.clone());
    }
    if let Some(agency) = &record.cognizant_agency {
        audit.insert("cognizant_agency".into(), json!(agency));
    }
    if let Some(agency) = &record.oversight_agency {
        audit.insert("oversight_agency".into(), json!(agency));
    }

    json!({
        "report_id": record.report_id().as_str(),
        "submission_status": record.status().as_str(),
        "data_source": record.data_source,
        "created_at": record.date_created().to_iso8601(),
        "history": record.history().iter().map(|e| json!({
            "event": e.status.as_str(),
            "timestamp": e.timestamp.to_iso8601(),
            "user": e.user,
        })).collect::<Vec<_>>(),
        "audit": audit,
        "resubmission": record.resubmission,
    })
}

/// Strip a single capitalised wrapper key, e.g. `{"NotesToSefa": {...}}`.
pub fn unwrap_section(section: &Value) -> Value {
    if let Value::Object(map) = section {
        if map.len() == 1 {
            if let Some((key, inner)) = map.iter().next() {
                if inner.is_object() && key.starts_with(|c: char| c.is_ascii_uppercase()) {
                    return inner.clone();
                }
            }
        }
    }
    section.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::IntakeSections;
    use fac_core::ReportId;

    fn record() -> SubmissionRecord {
        let intake = IntakeSections {
            general_information: Some(json!({"auditee_name": "Town of Example"})),
            federal_awards: Some(json!({"FederalAwards": {"federal_awards": [{"award_reference": "AWARD-0001"}]}})),
            ..Default::default()
        };
        SubmissionRecord::new(
            ReportId::new("2023-06-GSAFAC-0000000001").unwrap(),
            "GSAFAC",
            intake,
        )
    }

    #[test]
    fn test_legacy_shape_is_flat() {
        let doc = to_legacy_document(&record());
        assert_eq!(doc["submission_status"], "in_progress");
        assert_eq!(doc["transition_name"], json!(["in_progress"]));
        assert_eq!(doc["transition_date"].as_array().unwrap().len(), 1);
        assert_eq!(doc["general_information"]["auditee_name"], "Town of Example");
        assert!(doc["findings_text"].is_null());
        assert_eq!(
            doc["federal_awards"]["FederalAwards"]["federal_awards"][0]["award_reference"],
            "AWARD-0001"
        );
    }

    #[test]
    fn test_audit_shape_unwraps_sections() {
        let doc = to_audit_document(&record());
        assert_eq!(doc["history"][0]["event"], "in_progress");
        assert_eq!(
            doc["audit"]["federal_awards"]["federal_awards"][0]["award_reference"],
            "AWARD-0001"
        );
        assert_eq!(doc["audit"]["general_information"]["auditee_name"], "Town of Example");
        assert!(doc["audit"].get("findings_text").is_none());
        assert_eq!(doc["resubmission"]["version"], 1);
    }

    #[test]
    fn test_unwrap_leaves_lowercase_and_multi_key_alone() {
        let plain = json!({"auditee_name": {"x": 1}});
        assert_eq!(unwrap_section(&plain), plain);
        let multi = json!({"A": {}, "B": {}});
        assert_eq!(unwrap_section(&multi), multi);
        let scalar_wrapper = json!({"Wrapper": 3});
        assert_eq!(unwrap_section(&scalar_wrapper), scalar_wrapper);
    }
}
