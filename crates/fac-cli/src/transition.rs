//! # Transition Subcommand
//!
//! Moves a stored record to a new lifecycle status.
//!
//! ```bash
//! fac transition --report-id 2023-06-GSAFAC-0000000001 --to ready_for_certification
//! fac transition --report-id 2023-06-GSAFAC-0000000001 --to auditor_certified --certification cert.json
//! ```
//!
//! DISSEMINATED and RESUBMITTED are reached through `fac disseminate` and
//! `fac resubmit`, which do the work those statuses stand for.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use serde_json::Value;

use fac_state::SubmissionStatus;

use crate::config::FacConfig;
use crate::record::parse_id;
use crate::store::StateDir;

/// Arguments for the `transition` subcommand.
#[derive(Args, Debug)]
pub struct TransitionArgs {
    #[arg(long)]
    pub report_id: String,

    /// Target status, e.g. submitted or AUDITEE_CERTIFIED.
    #[arg(long)]
    pub to: SubmissionStatus,

    /// User recorded on the transition.
    #[arg(long)]
    pub user: Option<String>,

    /// Certification payload (JSON). Required for the two certify steps.
    #[arg(long)]
    pub certification: Option<PathBuf>,
}

/// Execute the transition subcommand.
pub fn run_transition(args: &TransitionArgs, config: &FacConfig) -> Result<u8> {
    let certification = match &args.certification {
        Some(path) => Some(crate::read_json::<Value>(path)?),
        None => None,
    };
    let state = StateDir::new(&config.state_dir);
    cmd_transition(
        &state,
        config,
        &args.report_id,
        args.to,
        args.user.as_deref(),
        certification,
    )
}

fn cmd_transition(
    state: &StateDir,
    config: &FacConfig,
    report_id: &str,
    to: SubmissionStatus,
    user: Option<&str>,
    certification: Option<Value>,
) -> Result<u8> {
    let id = parse_id(report_id)?;
    let mut record = state.load_record(&id)?;
    let lifecycle = state.lifecycle(&config.sinks);
    let from = record.status();

    let outcome = match (to, certification) {
        (SubmissionStatus::AuditorCertified, Some(payload)) => {
            lifecycle.auditor_certify(&mut record, payload, user)?
        }
        (SubmissionStatus::AuditeeCertified, Some(payload)) => {
            lifecycle.auditee_certify(&mut record, payload, user)?
        }
        (SubmissionStatus::AuditorCertified | SubmissionStatus::AuditeeCertified, None) => {
            bail!("--certification is required to move to {to}")
        }
        (SubmissionStatus::Disseminated, _) => {
            bail!("use `fac disseminate` to publish {id}")
        }
        (SubmissionStatus::Resubmitted, _) => {
            bail!("use `fac resubmit` to supersede {id}")
        }
        (_, Some(_)) => bail!("--certification only applies to the certify steps"),
        (_, None) => lifecycle.transition(&mut record, to, user)?,
    };
    state.save_record(&record)?;

    println!("OK: {id} {from} -> {}", record.status());
    Ok(crate::report_outcome(id.as_str(), &outcome))
}
