//! # fac CLI entry point
//!
//! Parses command-line arguments, loads configuration, and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fac_cli::check::{run_check, CheckArgs};
use fac_cli::config::FacConfig;
use fac_cli::dissemination::{run_disseminate, run_preview, DisseminateArgs, PreviewArgs};
use fac_cli::hash::{run_hash, HashArgs};
use fac_cli::record::{run_record, RecordArgs};
use fac_cli::resubmit::{run_resubmit, ResubmitArgs};
use fac_cli::transition::{run_transition, TransitionArgs};

/// Audit submission tooling.
///
/// Walks single-audit submissions through their lifecycle, disseminates
/// them to the public tables, and checks that the legacy and audit
/// storage shapes agree.
#[derive(Parser, Debug)]
#[command(name = "fac", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file. Defaults to ./fac.yaml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, edit, and inspect submission records.
    Record(RecordArgs),

    /// Move a record to a new lifecycle status.
    Transition(TransitionArgs),

    /// Publish SUBMITTED records to the dissemination tables.
    Disseminate(DisseminateArgs),

    /// Show the public rows a record would produce, without writing.
    Preview(PreviewArgs),

    /// Open an amended submission for a disseminated record.
    Resubmit(ResubmitArgs),

    /// Entity hashing and the hash field contract.
    Hash(HashArgs),

    /// Compare two representations of the same submission.
    Check(CheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match FacConfig::load(cli.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let result = match &cli.command {
        Commands::Record(args) => run_record(args, &config),
        Commands::Transition(args) => run_transition(args, &config),
        Commands::Disseminate(args) => run_disseminate(args, &config),
        Commands::Preview(args) => run_preview(args, &config),
        Commands::Resubmit(args) => run_resubmit(args, &config),
        Commands::Hash(args) => run_hash(args, &config),
        Commands::Check(args) => run_check(args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fac_cli::hash::HashCommand;
    use fac_cli::record::RecordCommand;
    use fac_state::SubmissionStatus;

    const ID: &str = "2023-06-GSAFAC-0000000001";

    #[test]
    fn cli_parse_record_create() {
        let cli = Cli::try_parse_from(["fac", "record", "create", "--report-id", ID, "--intake", "in.json"]).unwrap();
        let Commands::Record(args) = cli.command else {
            panic!("expected record");
        };
        match args.command {
            RecordCommand::Create { report_id, intake, data_source } => {
                assert_eq!(report_id, ID);
                assert_eq!(intake, Some(PathBuf::from("in.json")));
                assert!(data_source.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parse_record_edit_requires_file_or_clear() {
        assert!(Cli::try_parse_from(["fac", "record", "edit", "--report-id", ID, "--section", "notes_to_sefa"]).is_err());
        assert!(Cli::try_parse_from([
            "fac", "record", "edit", "--report-id", ID, "--section", "notes_to_sefa", "--file", "n.json", "--clear"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["fac", "record", "edit", "--report-id", ID, "--section", "notes_to_sefa", "--clear"]).is_ok());
    }

    #[test]
    fn cli_parse_transition_status_spellings() {
        for spelling in ["auditor_certified", "AUDITOR_CERTIFIED", "auditor-certified"] {
            let cli = Cli::try_parse_from(["fac", "transition", "--report-id", ID, "--to", spelling]).unwrap();
            let Commands::Transition(args) = cli.command else {
                panic!("expected transition");
            };
            assert_eq!(args.to, SubmissionStatus::AuditorCertified);
        }
        assert!(Cli::try_parse_from(["fac", "transition", "--report-id", ID, "--to", "published"]).is_err());
    }

    #[test]
    fn cli_parse_disseminate_one_or_all() {
        assert!(Cli::try_parse_from(["fac", "disseminate"]).is_err());
        assert!(Cli::try_parse_from(["fac", "disseminate", "--all", "--report-id", ID]).is_err());
        let cli = Cli::try_parse_from(["fac", "disseminate", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Disseminate(ref a) if a.all && a.report_id.is_none()));
    }

    #[test]
    fn cli_parse_resubmit() {
        let cli = Cli::try_parse_from([
            "fac", "resubmit", "--report-id", ID, "--new-report-id", "2024-01-GSAFAC-0000000007",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Resubmit(_)));
    }

    #[test]
    fn cli_parse_hash_entity_type_flag() {
        let cli = Cli::try_parse_from(["fac", "hash", "entity", "--type", "General", "--file", "g.json"]).unwrap();
        let Commands::Hash(args) = cli.command else {
            panic!("expected hash");
        };
        assert!(matches!(args.command, HashCommand::Entity { ref entity_type, canonical: false, .. } if entity_type == "General"));
    }

    #[test]
    fn cli_parse_check_positional_and_report() {
        let cli = Cli::try_parse_from(["fac", "check", "a.json", "b.json", "--terse"]).unwrap();
        assert!(matches!(cli.command, Commands::Check(ref a) if a.terse && a.target.is_some()));
        assert!(Cli::try_parse_from(["fac", "check", "a.json"]).is_err());
        assert!(Cli::try_parse_from(["fac", "check", "a.json", "b.json", "--report-id", ID]).is_err());
        assert!(Cli::try_parse_from(["fac", "check", "--report-id", ID]).is_ok());
    }

    #[test]
    fn cli_parse_global_flags() {
        let cli = Cli::try_parse_from(["fac", "-vv", "--config", "fac.yaml", "hash", "contract"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("fac.yaml")));
    }
}
