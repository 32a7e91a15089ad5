//! docrefresh: keep a repository's canonical docs in sync with a remote notebook.
//!
//! # Usage
//!
//! ```text
//! docrefresh run [PATH] [--validate-only|--sync-only|--full|--discovery-only]
//!                [--apply] [--force] [--threshold 0.15] [--artifacts audio,quiz]
//!                [--compact|--json] [--verbose] [--manifest FILE] [--remote-url URL]
//! docrefresh init [--force]
//! docrefresh status [--json]
//! ```
//!
//! Exit codes: 0 valid and successful, 1 validation or remote failures,
//! 2 operational error.

mod commands;
mod mcp;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{init::InitArgs, run::RunArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "docrefresh",
    version,
    about = "Detect documentation changes and sync them to a remote notebook",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover, validate, and (optionally) sync one repository.
    Run(RunArgs),

    /// Write the default document manifest to ~/.docrefresh/.
    Init(InitArgs),

    /// Show stored sync state for every tracked repository.
    Status(StatusArgs),
}

/// Outcome of a command that completed without an operational error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failed,
}

impl From<Verdict> for ExitCode {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Success => ExitCode::SUCCESS,
            Verdict::Failed => ExitCode::from(1),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Run(args) if args.verbose);
    init_tracing(verbose);

    let result = match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Init(args) => args.run(),
        Commands::Status(args) => args.run(),
    };

    match result {
        Ok(verdict) => verdict.into(),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or debug for our crates when verbose.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "warn,docrefresh=debug,docrefresh_core=debug,docrefresh_discover=debug,docrefresh_sync=debug,docrefresh_report=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
