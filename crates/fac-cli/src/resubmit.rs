//! # Resubmit Subcommand
//!
//! Opens an amended submission for a DISSEMINATED record. The new record
//! starts IN_PROGRESS with the original's intake; the original becomes
//! RESUBMITTED and its chain status DEPRECATED. The original's public rows
//! are rewritten so they name the amended report.
//!
//! ```bash
//! fac resubmit --report-id 2023-06-GSAFAC-0000000001 --new-report-id 2024-01-GSAFAC-0000000007
//! ```

use anyhow::{bail, Context, Result};
use clap::Args;

use fac_etl::refresh_public_rows;
use fac_state::{resubmit, Resubmission};

use crate::config::FacConfig;
use crate::record::parse_id;
use crate::store::StateDir;

/// Arguments for the `resubmit` subcommand.
#[derive(Args, Debug)]
pub struct ResubmitArgs {
    /// The disseminated record being superseded.
    #[arg(long)]
    pub report_id: String,

    /// Identifier assigned to the amended submission.
    #[arg(long)]
    pub new_report_id: String,

    /// User recorded on the RESUBMITTED transition.
    #[arg(long)]
    pub user: Option<String>,
}

/// Execute the resubmit subcommand.
pub fn run_resubmit(args: &ResubmitArgs, config: &FacConfig) -> Result<u8> {
    let state = StateDir::new(&config.state_dir);
    cmd_resubmit(
        &state,
        config,
        &args.report_id,
        &args.new_report_id,
        args.user.as_deref(),
    )
}

fn cmd_resubmit(
    state: &StateDir,
    config: &FacConfig,
    report_id: &str,
    new_report_id: &str,
    user: Option<&str>,
) -> Result<u8> {
    let id = parse_id(report_id)?;
    let new_id = parse_id(new_report_id)?;
    if state.has_record(&new_id) {
        bail!("record {new_id} already exists");
    }
    let mut original = state.load_record(&id)?;

    let Resubmission {
        record,
        previous_outcome,
        next_outcome,
    } = resubmit(&state.lifecycle(&config.sinks), &mut original, new_id, user)?;
    state.save_record(&original)?;
    state.save_record(&record)?;
    let refreshed = refresh_public_rows(&original, &state.dissemination_store())
        .with_context(|| format!("refreshing public rows of {}", original.report_id()))?;

    println!(
        "OK: {} resubmitted as {} (version {})",
        original.report_id(),
        record.report_id(),
        record.resubmission.version
    );
    for warning in &refreshed.warnings {
        println!("  WARN: {warning}");
    }
    let previous = crate::report_outcome(original.report_id().as_str(), &previous_outcome);
    let next = crate::report_outcome(record.report_id().as_str(), &next_outcome);
    Ok(previous.max(next))
}
