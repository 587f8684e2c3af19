//! # Record Subcommand
//!
//! Creates and edits submission records in the state directory.
//!
//! ```bash
//! fac record create --report-id 2023-06-GSAFAC-0000000001 --intake intake.json
//! fac record edit --report-id 2023-06-GSAFAC-0000000001 --section federal_awards --file awards.json
//! fac record show --report-id 2023-06-GSAFAC-0000000001
//! fac record list --status submitted
//! fac record chain --report-id 2023-06-GSAFAC-0000000001
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use fac_core::ReportId;
use fac_state::{Chain, IntakeSections, SubmissionRecord, SubmissionStatus, SECTION_NAMES};

use crate::config::FacConfig;
use crate::store::StateDir;

/// Arguments for the `record` subcommand.
#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(subcommand)]
    pub command: RecordCommand,
}

/// Record operations.
#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// Start a new IN_PROGRESS record.
    Create {
        /// Report identifier (YYYY-MM-SOURCE-NNNNNNNNNN).
        #[arg(long)]
        report_id: String,
        /// JSON file of intake sections keyed by section name.
        #[arg(long)]
        intake: Option<PathBuf>,
        /// Data source tag. Defaults to the configured source.
        #[arg(long)]
        data_source: Option<String>,
    },

    /// Replace or clear one intake section. Only IN_PROGRESS records.
    Edit {
        #[arg(long)]
        report_id: String,
        /// Section name, e.g. federal_awards.
        #[arg(long)]
        section: String,
        /// JSON file holding the new section content.
        #[arg(long, required_unless_present = "clear", conflicts_with = "clear")]
        file: Option<PathBuf>,
        /// Remove the section.
        #[arg(long)]
        clear: bool,
    },

    /// Print a stored record.
    Show {
        #[arg(long)]
        report_id: String,
    },

    /// List stored records, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<SubmissionStatus>,
    },

    /// Print the resubmission chain containing a record, oldest first.
    Chain {
        #[arg(long)]
        report_id: String,
    },
}

/// Execute the record subcommand.
pub fn run_record(args: &RecordArgs, config: &FacConfig) -> Result<u8> {
    let state = StateDir::new(&config.state_dir);
    match &args.command {
        RecordCommand::Create {
            report_id,
            intake,
            data_source,
        } => cmd_create(&state, config, report_id, intake.as_deref(), data_source.as_deref()),
        RecordCommand::Edit {
            report_id,
            section,
            file,
            clear,
        } => {
            let content = match (file, clear) {
                (Some(path), false) => Some(crate::read_json::<Value>(path)?),
                (None, true) => None,
                _ => bail!("exactly one of --file or --clear is required"),
            };
            cmd_edit(&state, config, report_id, section, content)
        }
        RecordCommand::Show { report_id } => cmd_show(&state, report_id),
        RecordCommand::List { status } => cmd_list(&state, *status),
        RecordCommand::Chain { report_id } => cmd_chain(&state, report_id),
    }
}

/// Parse a report id argument.
pub(crate) fn parse_id(value: &str) -> Result<ReportId> {
    ReportId::new(value).with_context(|| format!("invalid report id {value:?}"))
}

fn cmd_create(
    state: &StateDir,
    config: &FacConfig,
    report_id: &str,
    intake: Option<&std::path::Path>,
    data_source: Option<&str>,
) -> Result<u8> {
    let id = parse_id(report_id)?;
    if state.has_record(&id) {
        bail!("record {id} already exists");
    }
    let sections: IntakeSections = match intake {
        Some(path) => crate::read_json(path)?,
        None => IntakeSections::default(),
    };
    let data_source = data_source.unwrap_or(&config.data_source);
    if data_source != id.source() {
        tracing::warn!(
            report_id = %id,
            data_source,
            "data source differs from the report id source tag"
        );
    }
    let record = SubmissionRecord::new(id, data_source, sections);

    // Write the shapes first so a rejected primary leaves no record behind.
    let outcome = state
        .lifecycle(&config.sinks)
        .sync(&record)
        .with_context(|| format!("failed to store {}", record.report_id()))?;
    state.save_record(&record)?;

    println!("OK: created {} ({})", record.report_id(), record.status());
    Ok(crate::report_outcome(record.report_id().as_str(), &outcome))
}

fn cmd_edit(
    state: &StateDir,
    config: &FacConfig,
    report_id: &str,
    section: &str,
    content: Option<Value>,
) -> Result<u8> {
    if !SECTION_NAMES.contains(&section) {
        bail!(
            "unknown section {section:?}; expected one of: {}",
            SECTION_NAMES.join(", ")
        );
    }
    let id = parse_id(report_id)?;
    let mut record = state.load_record(&id)?;
    let cleared = content.is_none();
    record.edit_section(section, content)?;

    let outcome = state.lifecycle(&config.sinks).sync(&record)?;
    state.save_record(&record)?;

    let action = if cleared { "cleared" } else { "updated" };
    println!("OK: {action} {section} on {id}");
    Ok(crate::report_outcome(id.as_str(), &outcome))
}

fn cmd_show(state: &StateDir, report_id: &str) -> Result<u8> {
    let record = state.load_record(&parse_id(report_id)?)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(0)
}

fn cmd_list(state: &StateDir, status: Option<SubmissionStatus>) -> Result<u8> {
    for id in state.record_ids()? {
        let record = match state.load_record(&id) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(report_id = %id, "skipping unreadable record: {e:#}");
                continue;
            }
        };
        if status.is_some_and(|s| s != record.status()) {
            continue;
        }
        println!(
            "{}  {:<24}  v{} {}",
            id,
            record.status().to_string(),
            record.resubmission.version,
            record.resubmission.status()
        );
    }
    Ok(0)
}

fn cmd_chain(state: &StateDir, report_id: &str) -> Result<u8> {
    let id = parse_id(report_id)?;
    let records = state
        .record_ids()?
        .iter()
        .map(|id| state.load_record(id))
        .collect::<Result<Vec<_>>>()?;
    let chain = Chain::from_records(records);
    let links = chain.walk(&id)?;
    fac_state::validate_chain(&links)?;
    for record in links {
        println!(
            "{}  v{}  {}  {}",
            record.report_id(),
            record.resubmission.version,
            record.resubmission.status(),
            record.status()
        );
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkKind;
    use serde_json::json;

    const ID: &str = "2023-06-GSAFAC-0000000001";

    fn config(dir: &std::path::Path) -> FacConfig {
        FacConfig {
            state_dir: dir.to_path_buf(),
            ..FacConfig::default()
        }
    }

    #[test]
    fn create_writes_record_and_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = StateDir::new(dir.path());
        let intake = dir.path().join("intake.json");
        std::fs::write(
            &intake,
            json!({"general_information": {"auditee_name": "Town of Example"}}).to_string(),
        )
        .unwrap();

        assert_eq!(cmd_create(&state, &config, ID, Some(intake.as_path()), None).unwrap(), 0);

        let id = parse_id(ID).unwrap();
        let record = state.load_record(&id).unwrap();
        assert_eq!(record.status(), SubmissionStatus::InProgress);
        assert_eq!(record.data_source, "GSAFAC");
        let legacy = state.sink_document(SinkKind::Legacy, &id).unwrap();
        assert_eq!(legacy["general_information"]["auditee_name"], "Town of Example");
        assert!(state.sink_document(SinkKind::Audit, &id).is_ok());
    }

    #[test]
    fn create_rejects_duplicates_and_bad_ids() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = StateDir::new(dir.path());
        cmd_create(&state, &config, ID, None, Some("CENSUS")).unwrap();
        assert!(cmd_create(&state, &config, ID, None, None).is_err());
        assert!(cmd_create(&state, &config, "../escape", None, None).is_err());
    }

    #[test]
    fn edit_replaces_and_clears_section() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = StateDir::new(dir.path());
        cmd_create(&state, &config, ID, None, None).unwrap();

        cmd_edit(&state, &config, ID, "notes_to_sefa", Some(json!({"NotesToSefa": {}}))).unwrap();
        let id = parse_id(ID).unwrap();
        assert!(state.load_record(&id).unwrap().intake().notes_to_sefa.is_some());

        cmd_edit(&state, &config, ID, "notes_to_sefa", None).unwrap();
        assert!(state.load_record(&id).unwrap().intake().notes_to_sefa.is_none());
    }

    #[test]
    fn edit_rejects_unknown_section() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = StateDir::new(dir.path());
        cmd_create(&state, &config, ID, None, None).unwrap();
        let err = cmd_edit(&state, &config, ID, "budget", Some(json!({}))).unwrap_err();
        assert!(err.to_string().contains("unknown section"));
    }

    #[test]
    fn edit_rejected_once_locked() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = StateDir::new(dir.path());
        cmd_create(&state, &config, ID, None, None).unwrap();

        let id = parse_id(ID).unwrap();
        let mut record = state.load_record(&id).unwrap();
        let _ = state
            .lifecycle(&config.sinks)
            .lock_for_certification(&mut record, None)
            .unwrap();
        state.save_record(&record).unwrap();

        assert!(cmd_edit(&state, &config, ID, "federal_awards", Some(json!({}))).is_err());
    }

    #[test]
    fn list_and_show_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = StateDir::new(dir.path());
        cmd_create(&state, &config, ID, None, None).unwrap();
        assert_eq!(cmd_list(&state, Some(SubmissionStatus::Submitted)).unwrap(), 0);
        assert_eq!(cmd_show(&state, ID).unwrap(), 0);
        assert!(cmd_show(&state, "2023-06-GSAFAC-0000000002").is_err());
    }

    #[test]
    fn chain_of_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = StateDir::new(dir.path());
        cmd_create(&state, &config, ID, None, None).unwrap();
        assert_eq!(cmd_chain(&state, ID).unwrap(), 0);
    }
}
