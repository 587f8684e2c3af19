//! # Check Subcommand
//!
//! Compares two JSON documents with the tolerant consistency checker.
//!
//! ```bash
//! fac check legacy.json audit.json --terse
//! fac check --report-id 2023-06-GSAFAC-0000000001
//! fac check --all
//! ```
//!
//! With `--report-id` the record's legacy shape is checked against its
//! audit shape. Exits 1 when any non-tolerated discrepancy is found.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use serde_json::Value;

use fac_consistency::{check, CheckMode, CheckReport};
use fac_core::ReportId;

use crate::config::{FacConfig, SinkKind};
use crate::record::parse_id;
use crate::store::StateDir;

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Source document (JSON).
    #[arg(requires = "target", conflicts_with_all = ["report_id", "all"])]
    pub source: Option<PathBuf>,

    /// Target document (JSON).
    pub target: Option<PathBuf>,

    /// Check one stored record's legacy shape against its audit shape.
    #[arg(long, conflicts_with = "all")]
    pub report_id: Option<String>,

    /// Check every stored record.
    #[arg(long)]
    pub all: bool,

    /// Report only discrepancies that fail the check.
    #[arg(long)]
    pub terse: bool,
}

/// Execute the check subcommand.
pub fn run_check(args: &CheckArgs, config: &FacConfig) -> Result<u8> {
    let mode = if args.terse {
        CheckMode::Terse
    } else {
        CheckMode::Verbose
    };
    let state = StateDir::new(&config.state_dir);
    let reports: Vec<(Option<ReportId>, CheckReport)> = match (&args.source, &args.target, &args.report_id, args.all) {
        (Some(source), Some(target), None, false) => {
            let source: Value = crate::read_json(source)?;
            let target: Value = crate::read_json(target)?;
            vec![(None, check(&source, &target, mode))]
        }
        (None, None, Some(report_id), false) => {
            let id = parse_id(report_id)?;
            vec![(Some(id.clone()), check_record(&state, &id, mode)?)]
        }
        (None, None, None, true) => state
            .record_ids()?
            .into_iter()
            .map(|id| check_record(&state, &id, mode).map(|r| (Some(id), r)))
            .collect::<Result<_>>()?,
        _ => bail!("give SOURCE and TARGET, --report-id, or --all"),
    };

    let mut code = 0;
    for (id, report) in reports {
        if args.all {
            let label = id.as_ref().map(ReportId::as_str).unwrap_or_default();
            let verdict = if report.ok { "OK" } else { "FAIL" };
            println!("{verdict}: {label} ({} discrepancies)", report.discrepancies.len());
        } else {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        if !report.ok {
            code = 1;
        }
    }
    Ok(code)
}

/// Check a stored record's legacy shape against its audit shape.
fn check_record(state: &StateDir, id: &ReportId, mode: CheckMode) -> Result<CheckReport> {
    let legacy = state.sink_document(SinkKind::Legacy, id)?;
    let audit = state.sink_document(SinkKind::Audit, id)?;
    let report = check(&legacy, &audit, mode);
    tracing::debug!(report_id = %id, ok = report.ok, discrepancies = report.discrepancies.len(), "checked");
    Ok(report)
}
