//! `docrefresh status`: stored sync state per repository.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use docrefresh_core::{state, RepoKey, RepoState};
use docrefresh_report::format_age;

use crate::Verdict;

/// Arguments for `docrefresh status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<Verdict> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let rows = build_rows(&home, Utc::now())?;
        if self.json {
            print_json(&rows)?;
        } else {
            print_table(rows);
        }
        Ok(Verdict::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SyncSignal {
    NeverSynced,
    Synced,
    /// Synced, but some artifacts have not reported completion.
    ArtifactsPending,
}

#[derive(Debug, Clone, Serialize)]
struct RepoStatus {
    repo: String,
    status: SyncSignal,
    notebook_id: Option<String>,
    docs: usize,
    artifacts: usize,
    meta_version: Option<String>,
    last_sync_at: Option<DateTime<Utc>>,
    last_sync_age: String,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "")]
    indicator: String,
    #[tabled(rename = "repository")]
    repo: String,
    #[tabled(rename = "notebook")]
    notebook: String,
    #[tabled(rename = "docs")]
    docs: usize,
    #[tabled(rename = "artifacts")]
    artifacts: usize,
    #[tabled(rename = "version")]
    version: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

fn build_rows(home: &Path, now: DateTime<Utc>) -> Result<Vec<RepoStatus>> {
    let states = state::list_at(home).context("failed to load stored state")?;
    Ok(states
        .into_iter()
        .map(|(key, st)| repo_status(key, st, now))
        .collect())
}

fn repo_status(key: RepoKey, st: RepoState, now: DateTime<Utc>) -> RepoStatus {
    let pending = st
        .artifacts
        .values()
        .any(|a| !matches!(a.status.to_ascii_lowercase().as_str(), "ready" | "completed" | "complete"));
    let status = match (st.last_sync, pending) {
        (None, _) => SyncSignal::NeverSynced,
        (Some(_), true) => SyncSignal::ArtifactsPending,
        (Some(_), false) => SyncSignal::Synced,
    };
    RepoStatus {
        repo: key.0,
        status,
        notebook_id: st.notebook_id,
        docs: st.docs.len(),
        artifacts: st.artifacts.len(),
        meta_version: st.meta_version,
        last_sync_at: st.last_sync,
        last_sync_age: format_age(st.last_sync, now),
    }
}

fn print_json(rows: &[RepoStatus]) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(rows).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(rows: Vec<RepoStatus>) {
    println!(
        "docrefresh v{} | {} repositories",
        env!("CARGO_PKG_VERSION"),
        rows.len()
    );
    if rows.is_empty() {
        println!("No repositories tracked yet. Run `docrefresh run --apply <path>` first.");
        return;
    }

    println!(
        "Indicators: {} SYNCED  {} ARTIFACTS PENDING  {} NEVER SYNCED",
        indicator(SyncSignal::Synced),
        indicator(SyncSignal::ArtifactsPending),
        indicator(SyncSignal::NeverSynced),
    );
    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            indicator: indicator(row.status),
            repo: row.repo,
            notebook: row.notebook_id.unwrap_or_else(|| "-".to_owned()),
            docs: row.docs,
            artifacts: row.artifacts,
            version: row.meta_version.unwrap_or_else(|| "-".to_owned()),
            last_sync: row.last_sync_age,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn indicator(signal: SyncSignal) -> String {
    match signal {
        SyncSignal::NeverSynced => "■".bright_black().bold().to_string(),
        SyncSignal::Synced => "■".green().bold().to_string(),
        SyncSignal::ArtifactsPending => "■".yellow().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docrefresh_core::ArtifactState;

    fn synced_state(now: DateTime<Utc>, artifact_status: &str) -> RepoState {
        let mut st = RepoState {
            notebook_id: Some("nb-1".into()),
            last_sync: Some(now - Duration::hours(3)),
            ..RepoState::default()
        };
        st.record_artifact(
            "quiz",
            ArtifactState {
                artifact_id: Some("art-1".into()),
                status: artifact_status.into(),
                created_at: now,
            },
        );
        st
    }

    #[test]
    fn never_synced_without_last_sync() {
        let now = Utc::now();
        let row = repo_status(RepoKey::from("demo"), RepoState::default(), now);
        assert_eq!(row.status, SyncSignal::NeverSynced);
        assert_eq!(row.last_sync_age, "never");
    }

    #[test]
    fn initiated_artifacts_are_pending() {
        let now = Utc::now();
        let row = repo_status(RepoKey::from("demo"), synced_state(now, "initiated"), now);
        assert_eq!(row.status, SyncSignal::ArtifactsPending);
        assert_eq!(row.last_sync_age, "3h ago");

        let row = repo_status(RepoKey::from("demo"), synced_state(now, "completed"), now);
        assert_eq!(row.status, SyncSignal::Synced);
    }

    #[test]
    fn rows_come_from_stored_state_files() {
        let home = tempfile::TempDir::new().unwrap();
        let now = Utc::now();
        state::save_at(home.path(), &RepoKey::from("b-repo"), &synced_state(now, "ready")).unwrap();
        state::save_at(home.path(), &RepoKey::from("a-repo"), &RepoState::default()).unwrap();

        let rows = build_rows(home.path(), now).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.repo.as_str()).collect();
        assert_eq!(names, ["a-repo", "b-repo"]);
        assert_eq!(rows[1].artifacts, 1);
    }
}
