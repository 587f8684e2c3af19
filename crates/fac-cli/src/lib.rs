//! # fac-cli — Audit Submission Command-Line Interface
//!
//! Operator tooling over a file-backed state directory. Records, the two
//! storage shapes, and the dissemination rows all live under one root so
//! a submission can be walked through its lifecycle and inspected by hand.
//!
//! ## Subcommands
//!
//! - `record`: create, edit, show, and list submission records
//! - `transition`: move a record through the lifecycle
//! - `disseminate` / `preview`: run or preview the public-data transform
//! - `resubmit`: open an amended submission for a disseminated one
//! - `hash`: entity hashing and the hash contract
//! - `check`: compare the legacy and audit shapes of a record
//!
//! ## Crate Policy
//!
//! - Argument parsing stays in `main.rs` and the `*Args` types.
//! - Handlers delegate to the domain crates; no business rules live here.
//! - Handlers return an exit code; errors propagate as `anyhow::Error`.

pub mod check;
pub mod config;
pub mod dissemination;
pub mod hash;
pub mod record;
pub mod resubmit;
pub mod store;
pub mod transition;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use fac_state::TransitionOutcome;

/// Exit code for a change the primary sink accepted but a secondary missed.
pub const EXIT_PARTIAL_WRITE: u8 = 2;

/// Read and parse a JSON file, naming the file on failure.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Print any sink failures for `report_id` and map the outcome to an exit code.
pub fn report_outcome(report_id: &str, outcome: &TransitionOutcome) -> u8 {
    match outcome {
        TransitionOutcome::Applied => 0,
        TransitionOutcome::PartialWrite { failed } => {
            for failure in failed {
                tracing::warn!(report_id, sink = %failure.sink, "secondary sink write failed: {}", failure.cause);
                eprintln!("WARN: {report_id} not written to sink {}: {}", failure.sink, failure.cause);
            }
            EXIT_PARTIAL_WRITE
        }
    }
}
