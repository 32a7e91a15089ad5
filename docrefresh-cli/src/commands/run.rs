//! `docrefresh run [PATH]`: discovery, validation, sync and artifact regeneration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use docrefresh_core::{manifest, state, RepoKey};
use docrefresh_report::{compact_line, user_template_dir_at, Reporter, RunSummary};
use docrefresh_sync::{
    artifact_plan::DEFAULT_THRESHOLD,
    parse_artifact_list,
    pipeline::{self, RunMode, RunOptions, RunReport},
    PollConfig, RegenerationFlags, RemoteStore,
};

use crate::mcp::McpRemote;
use crate::Verdict;

/// Arguments for `docrefresh run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repository root. Defaults to the current directory.
    #[arg(value_name = "PATH", conflicts_with = "target")]
    pub path: Option<PathBuf>,

    /// Repository root, as a flag.
    #[arg(long, value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Discover, hash and validate; no sync planning.
    #[arg(long, group = "mode")]
    pub validate_only: bool,

    /// Discover, hash and sync; skips validation and artifacts.
    #[arg(long, group = "mode")]
    pub sync_only: bool,

    /// Everything, including artifact regeneration (default).
    #[arg(long, group = "mode")]
    pub full: bool,

    /// Print the discovery report only.
    #[arg(long, group = "mode")]
    pub discovery_only: bool,

    /// Mutate the remote notebook and the stored state. Without it the run is a dry run.
    #[arg(long)]
    pub apply: bool,

    /// Regenerate artifacts regardless of the change delta.
    #[arg(long)]
    pub force: bool,

    /// Change ratio above which artifacts are regenerated.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
    pub threshold: f64,

    /// Comma-separated artifact subset (audio, mind_map, briefing, study,
    /// infographic, flashcards, quiz).
    #[arg(long, value_name = "LIST")]
    pub artifacts: Option<String>,

    /// One line per repository.
    #[arg(long, conflicts_with = "json")]
    pub compact: bool,

    /// Machine-readable summary.
    #[arg(long)]
    pub json: bool,

    /// Log every phase and per-item outcome to stderr.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Manifest file. Defaults to ~/.docrefresh/canonical_docs.yaml, then the built-in one.
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// MCP endpoint of the remote notebook service, e.g. http://localhost:8080/mcp.
    #[arg(long, env = "DOCREFRESH_REMOTE_URL", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Seconds between artifact status polls.
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    pub poll_interval: u64,

    /// Give up waiting for artifacts after this many seconds. 0 skips polling.
    #[arg(long, default_value_t = 300, value_name = "SECS")]
    pub poll_timeout: u64,
}

impl RunArgs {
    pub fn run(self) -> Result<Verdict> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        self.run_at(&home)
    }

    fn mode(&self) -> RunMode {
        if self.discovery_only {
            RunMode::DiscoveryOnly
        } else if self.validate_only {
            RunMode::ValidateOnly
        } else if self.sync_only {
            RunMode::SyncOnly
        } else {
            RunMode::Full
        }
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            mode: self.mode(),
            apply: self.apply,
            regeneration: RegenerationFlags {
                force: self.force,
                major_version_bump: false,
                threshold: self.threshold,
            },
            artifacts: parse_artifact_list(self.artifacts.as_deref()),
            poll: PollConfig {
                interval: Duration::from_secs(self.poll_interval),
                timeout: Duration::from_secs(self.poll_timeout),
            },
        }
    }

    fn run_at(self, home: &Path) -> Result<Verdict> {
        let target = self
            .path
            .clone()
            .or_else(|| self.target.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let repo = target
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", target.display()))?;
        if !repo.is_dir() {
            bail!("'{}' is not a directory", repo.display());
        }

        let manifest = manifest::resolve_at(home, self.manifest.as_deref())
            .context("failed to load document manifest")?;
        let key = RepoKey::from_path(&repo);
        let stored = state::load_at(home, &key)
            .with_context(|| format!("failed to load stored state for '{key}'"))?;

        let remote = match self.remote_url.as_deref() {
            Some(url) => Some(
                McpRemote::connect(url)
                    .with_context(|| format!("cannot reach remote at {url}"))?,
            ),
            None => None,
        };
        let remote_ref = remote.as_ref().map(|r| r as &dyn RemoteStore);

        let options = self.options();
        let report = pipeline::run(&repo, &manifest, stored, remote_ref, &options)
            .with_context(|| format!("run failed for '{key}'"))?;

        if report.state_changed {
            state::save_at(home, &key, &report.state)
                .with_context(|| format!("failed to save state for '{key}'"))?;
        }

        self.print(home, &report)?;

        Ok(if report.success() {
            Verdict::Success
        } else {
            Verdict::Failed
        })
    }

    fn print(&self, home: &Path, report: &RunReport) -> Result<()> {
        if self.json {
            println!("{}", RunSummary::from_report(report).to_json()?);
            return Ok(());
        }
        if self.compact {
            println!("{}", compact_line(report));
            return Ok(());
        }

        let reporter = Reporter::with_overrides(Some(&user_template_dir_at(home)))
            .context("failed to load report templates")?;
        println!("{}", reporter.run_report(report)?);
        print_footer(report);
        Ok(())
    }
}

fn print_footer(report: &RunReport) {
    let key = &report.inventory.repo_key;
    let dry_run = !report.applied && matches!(report.mode, RunMode::SyncOnly | RunMode::Full);
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if report.success() {
        println!("{prefix}{} '{key}' ok", "✓".green().bold());
    } else if !report.is_valid() {
        println!("{prefix}{} '{key}' has validation errors", "✗".red().bold());
    } else {
        println!("{prefix}{} '{key}' finished with remote errors", "✗".red().bold());
    }
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threshold must be between 0 and 1, got {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        Harness::try_parse_from(std::iter::once("run").chain(argv.iter().copied()))
            .expect("parse")
            .args
    }

    #[test]
    fn defaults_to_full_dry_run() {
        let args = parse(&[]);
        let opts = args.options();
        assert_eq!(opts.mode, RunMode::Full);
        assert!(!opts.apply);
        assert_eq!(opts.regeneration.threshold, DEFAULT_THRESHOLD);
        assert_eq!(opts.poll.timeout, Duration::from_secs(300));
        assert_eq!(opts.artifacts.len(), 7);
    }

    #[test]
    fn mode_flags_are_exclusive() {
        assert_eq!(parse(&["--sync-only"]).mode(), RunMode::SyncOnly);
        assert_eq!(parse(&["--discovery-only"]).mode(), RunMode::DiscoveryOnly);
        assert!(Harness::try_parse_from(["run", "--sync-only", "--validate-only"]).is_err());
    }

    #[test]
    fn artifact_subset_is_parsed() {
        let opts = parse(&["--artifacts", "quiz,audio"]).options();
        assert_eq!(opts.artifacts.len(), 2);
    }

    #[test]
    fn threshold_must_be_a_ratio() {
        assert_eq!(parse_threshold("0.3"), Ok(0.3));
        assert!(parse_threshold("1.5").is_err());
        assert!(parse_threshold("abc").is_err());
    }
}
