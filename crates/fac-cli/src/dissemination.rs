//! # Disseminate and Preview Subcommands
//!
//! ```bash
//! fac disseminate --report-id 2023-06-GSAFAC-0000000001
//! fac disseminate --all
//! fac preview --report-id 2023-06-GSAFAC-0000000001
//! ```
//!
//! `disseminate --all` runs every SUBMITTED record. A failing record is
//! logged and skipped so one bad submission does not hold back the rest.

use anyhow::Result;
use clap::Args;

use fac_core::ReportId;
use fac_etl::{disseminate, preview, DisseminationReport};
use fac_state::SubmissionStatus;

use crate::config::FacConfig;
use crate::record::parse_id;
use crate::store::StateDir;

/// Arguments for the `disseminate` subcommand.
#[derive(Args, Debug)]
pub struct DisseminateArgs {
    /// Disseminate one record.
    #[arg(long, required_unless_present = "all", conflicts_with = "all")]
    pub report_id: Option<String>,

    /// Disseminate every SUBMITTED record.
    #[arg(long)]
    pub all: bool,

    /// User recorded on the DISSEMINATED transition.
    #[arg(long)]
    pub user: Option<String>,

    /// Print each run's report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `preview` subcommand.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[arg(long)]
    pub report_id: String,
}

/// Execute the disseminate subcommand.
pub fn run_disseminate(args: &DisseminateArgs, config: &FacConfig) -> Result<u8> {
    let state = StateDir::new(&config.state_dir);
    match &args.report_id {
        Some(report_id) => {
            let report = disseminate_one(&state, config, &parse_id(report_id)?, args.user.as_deref())?;
            print_report(&report, args.json)
        }
        None => cmd_disseminate_all(&state, config, args.user.as_deref(), args.json),
    }
}

fn disseminate_one(
    state: &StateDir,
    config: &FacConfig,
    id: &ReportId,
    user: Option<&str>,
) -> Result<DisseminationReport> {
    let mut record = state.load_record(id)?;
    let report = disseminate(
        &state.lifecycle(&config.sinks),
        &mut record,
        &state.dissemination_store(),
        user,
    )?;
    state.save_record(&record)?;
    Ok(report)
}

fn cmd_disseminate_all(
    state: &StateDir,
    config: &FacConfig,
    user: Option<&str>,
    json: bool,
) -> Result<u8> {
    let mut code = 0;
    let mut processed = 0usize;
    for id in state.record_ids()? {
        match state.load_record(&id) {
            Ok(record) if record.status() == SubmissionStatus::Submitted => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(report_id = %id, "skipping unreadable record: {e:#}");
                continue;
            }
        }
        processed += 1;
        match disseminate_one(state, config, &id, user) {
            Ok(report) => code = code.max(print_report(&report, json)?),
            Err(e) => {
                tracing::error!(report_id = %id, "dissemination failed: {e:#}");
                code = 1;
            }
        }
    }
    println!("OK: processed {processed} submitted record(s)");
    Ok(code)
}

/// Print a run summary. Returns 2 when a record sink missed the write.
fn print_report(report: &DisseminationReport, json: bool) -> Result<u8> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        let rows: usize = report.counts.values().sum();
        println!(
            "OK: disseminated {} ({rows} rows, {} warnings)",
            report.report_id,
            report.warnings.len()
        );
        for warning in &report.warnings {
            println!("  WARN: {warning}");
        }
    }
    if report.failed_sinks.is_empty() {
        return Ok(0);
    }
    for failure in &report.failed_sinks {
        eprintln!(
            "WARN: {} not written to sink {}: {}",
            report.report_id, failure.sink, failure.cause
        );
    }
    Ok(crate::EXIT_PARTIAL_WRITE)
}

/// Execute the preview subcommand.
pub fn run_preview(args: &PreviewArgs, config: &FacConfig) -> Result<u8> {
    let state = StateDir::new(&config.state_dir);
    let record = state.load_record(&parse_id(&args.report_id)?)?;
    println!("{}", serde_json::to_string_pretty(&preview(&record))?);
    Ok(0)
}
