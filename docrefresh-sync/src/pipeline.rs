//! One reconciliation run for one repository.
//!
//! [`run`] takes every input explicitly and returns the updated state in the
//! report; persisting it is the caller's job. Dry runs never touch the state
//! or the remote beyond read-only listing.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use docrefresh_core::{Manifest, RepoState, RepositoryInventory};
use docrefresh_discover::{
    discover_repo, is_major_version_bump, read_meta_version, validate_inventory, ValidationReport,
};
use serde::Serialize;

use crate::apply::{apply_sync_plan, SyncOutcome};
use crate::artifact::ArtifactType;
use crate::artifact_apply::{apply_artifact_plan, ArtifactOutcome, PollConfig};
use crate::artifact_plan::{compute_artifact_plan, ArtifactPlan, RegenerationFlags};
use crate::change::{compare, hash_inventory, ChangeComparison};
use crate::error::SyncError;
use crate::notebook::{ensure_notebook, notebook_title};
use crate::plan::{compute_sync_plan, SyncPlan};
use crate::remote::{RemoteSource, RemoteStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Discovery only.
    DiscoveryOnly,
    /// Discover, hash, validate.
    ValidateOnly,
    /// Discover, hash, sync. Validation is skipped.
    SyncOnly,
    /// Everything, including artifact regeneration.
    #[default]
    Full,
}

impl RunMode {
    fn validates(self) -> bool {
        matches!(self, RunMode::ValidateOnly | RunMode::Full)
    }

    fn syncs(self) -> bool {
        matches!(self, RunMode::SyncOnly | RunMode::Full)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Mutate the remote and the stored state. Off means dry run.
    pub apply: bool,
    /// `force` and `threshold`; the major-version flag is computed here.
    pub regeneration: RegenerationFlags,
    /// Empty selects the standard set.
    pub artifacts: Vec<ArtifactType>,
    pub poll: PollConfig,
}

/// Everything one run observed and did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub applied: bool,
    pub inventory: RepositoryInventory,
    pub comparison: Option<ChangeComparison>,
    pub validation: Option<ValidationReport>,
    pub sync_plan: Option<SyncPlan>,
    pub sync_outcome: Option<SyncOutcome>,
    pub artifact_plan: Option<ArtifactPlan>,
    pub artifact_outcome: Option<ArtifactOutcome>,
    pub meta_version: Option<String>,
    pub major_version_bump: bool,
    /// State after this run; equal to the input on dry runs.
    #[serde(skip)]
    pub state: RepoState,
    #[serde(skip)]
    pub state_changed: bool,
}

impl RunReport {
    /// No ERROR-level validation issue (true when validation did not run).
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().map_or(true, ValidationReport::is_valid)
    }

    pub fn success(&self) -> bool {
        self.is_valid()
            && self.sync_outcome.as_ref().map_or(true, SyncOutcome::success)
            && self
                .artifact_outcome
                .as_ref()
                .map_or(true, ArtifactOutcome::success)
    }
}

/// Run the pipeline for `repo_path`.
///
/// `remote` may be `None` for dry runs, in which case planning assumes an
/// empty notebook. Applying without a remote is [`SyncError::NoRemote`].
pub fn run(
    repo_path: &Path,
    manifest: &Manifest,
    state: RepoState,
    remote: Option<&dyn RemoteStore>,
    options: &RunOptions,
) -> Result<RunReport, SyncError> {
    let mode = options.mode;
    if options.apply && mode.syncs() && remote.is_none() {
        return Err(SyncError::NoRemote);
    }

    tracing::info!("discovering {}", repo_path.display());
    let inventory = discover_repo(repo_path, manifest, &state.stored_fingerprints())?;
    let repo_key = inventory.repo_key.clone();
    let meta_version = read_meta_version(repo_path);
    let major_version_bump =
        is_major_version_bump(state.meta_version.as_deref(), meta_version.as_deref());

    let mut report = RunReport {
        mode,
        applied: options.apply && mode.syncs(),
        inventory,
        comparison: None,
        validation: None,
        sync_plan: None,
        sync_outcome: None,
        artifact_plan: None,
        artifact_outcome: None,
        meta_version,
        major_version_bump,
        state,
        state_changed: false,
    };
    if mode == RunMode::DiscoveryOnly {
        return Ok(report);
    }

    tracing::info!("{repo_key}: hashing {} document(s)", report.inventory.hashable().count());
    report.inventory = hash_inventory(&report.inventory)?;
    let comparison = compare(&report.inventory);

    if mode.validates() {
        tracing::info!("{repo_key}: validating");
        report.validation = Some(validate_inventory(&report.inventory));
    }
    if !mode.syncs() {
        report.comparison = Some(comparison);
        return Ok(report);
    }

    // Notebook resolution and remote listing are read-only here; creation
    // waits until we know there is something to apply.
    let (mut notebook_id, sources) = match remote {
        Some(remote) => {
            let resolved =
                ensure_notebook(remote, &repo_key, report.state.notebook_id.as_deref(), false)?;
            let id = resolved.id().map(str::to_owned);
            let sources = match &id {
                Some(id) => remote.list_sources(id)?,
                None => Vec::new(),
            };
            (id, sources)
        }
        None => (report.state.notebook_id.clone(), Vec::new()),
    };

    let listed = notebook_id.is_some();

    tracing::info!("{repo_key}: planning sync");
    let mut plan = compute_sync_plan(
        &report.inventory,
        &comparison,
        notebook_id.as_deref(),
        &sources,
        &report.state.docs,
    );

    if let (true, Some(remote)) = (options.apply, remote) {
        if notebook_id.is_none() && !plan.actions.is_empty() {
            let created = remote.create_notebook(&notebook_title(&repo_key))?;
            tracing::info!("{repo_key}: created notebook {}", created.id);
            notebook_id = Some(created.id);
            plan.notebook_id = notebook_id.clone();
        }
        if plan.notebook_id.is_some() {
            report.sync_plan = Some(plan.clone());
            tracing::info!("{repo_key}: applying sync");
            let outcome = apply_sync_plan(remote, plan, repo_path);
            outcome.merge_into(&mut report.state, Utc::now());
            if listed {
                let pruned = prune_orphaned_docs(&mut report.state, &report.inventory, &sources);
                if !pruned.is_empty() {
                    tracing::info!("{repo_key}: dropped orphaned ledger entries {pruned:?}");
                }
            }
            report.state_changed = true;
            report.sync_outcome = Some(outcome);
        } else {
            report.sync_plan = Some(plan);
        }
    } else {
        report.sync_plan = Some(plan);
    }

    if mode == RunMode::Full {
        let flags = RegenerationFlags {
            major_version_bump,
            ..options.regeneration
        };
        let artifact_plan = compute_artifact_plan(
            &repo_key,
            notebook_id.as_deref(),
            &comparison,
            flags,
            &options.artifacts,
        );
        if let (true, Some(remote)) = (options.apply, remote) {
            if artifact_plan.has_work() {
                tracing::info!("{repo_key}: regenerating artifacts");
                let outcome = apply_artifact_plan(remote, &artifact_plan, options.poll);
                outcome.merge_into(&mut report.state, Utc::now());
                report.state_changed = true;
                report.artifact_outcome = Some(outcome);
            }
        }
        report.artifact_plan = Some(artifact_plan);
    }

    if meta_version_settled(&report) {
        report.state.meta_version = report.meta_version.clone();
    }
    report.comparison = Some(comparison);
    Ok(report)
}

/// Ledger entries with neither a local document nor a remote source.
fn prune_orphaned_docs(
    state: &mut RepoState,
    inventory: &RepositoryInventory,
    sources: &[RemoteSource],
) -> Vec<String> {
    let local: HashSet<String> = inventory.existing().map(|d| d.key()).collect();
    let remote: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();
    state.prune_docs(|path, entry| {
        local.contains(path)
            || (!entry.source_id.is_empty() && remote.contains(entry.source_id.as_str()))
    })
}

/// A clean sync advances the stored version, except that a pending major
/// bump is only consumed by a clean artifact regeneration.
fn meta_version_settled(report: &RunReport) -> bool {
    let synced = report.sync_outcome.as_ref().is_some_and(SyncOutcome::success);
    if !synced || !report.major_version_bump {
        return synced;
    }
    match (&report.artifact_plan, &report.artifact_outcome) {
        (Some(_), Some(outcome)) => outcome.success(),
        (Some(plan), None) => !plan.has_work(),
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryRemote;
    use std::fs;
    use tempfile::TempDir;

    fn repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("demo");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("README.md"), "---\nversion: 1.0\ndate: 2026-01-01\n---\n# Demo\n").unwrap();
        fs::write(root.join("CHANGELOG.md"), "---\nversion: 1.0\ndate: 2026-01-01\n---\n# Log\n").unwrap();
        fs::write(root.join("META.yaml"), "version: \"1.0.0\"\ndate: 2026-01-01\n").unwrap();
        tmp
    }

    #[test]
    fn apply_without_remote_is_operational_error() {
        let tmp = repo();
        let opts = RunOptions {
            apply: true,
            ..RunOptions::default()
        };
        let err = run(&tmp.path().join("demo"), &Manifest::builtin().unwrap(), RepoState::default(), None, &opts)
            .unwrap_err();
        assert!(matches!(err, SyncError::NoRemote));
    }

    #[test]
    fn dry_run_without_remote_plans_everything_as_add() {
        let tmp = repo();
        let report = run(
            &tmp.path().join("demo"),
            &Manifest::builtin().unwrap(),
            RepoState::default(),
            None,
            &RunOptions::default(),
        )
        .unwrap();
        let plan = report.sync_plan.unwrap();
        assert_eq!(plan.count(crate::plan::SyncActionKind::Add), 3);
        assert!(plan.needs_create());
        assert!(!report.state_changed);
    }

    #[test]
    fn validate_only_never_touches_remote() {
        let tmp = repo();
        let remote = MemoryRemote::new();
        let opts = RunOptions {
            mode: RunMode::ValidateOnly,
            ..RunOptions::default()
        };
        let report = run(
            &tmp.path().join("demo"),
            &Manifest::builtin().unwrap(),
            RepoState::default(),
            Some(&remote),
            &opts,
        )
        .unwrap();
        assert!(report.validation.is_some());
        assert!(report.sync_plan.is_none());
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn applied_run_records_meta_version() {
        let tmp = repo();
        let remote = MemoryRemote::new();
        let opts = RunOptions {
            mode: RunMode::SyncOnly,
            apply: true,
            ..RunOptions::default()
        };
        let report = run(
            &tmp.path().join("demo"),
            &Manifest::builtin().unwrap(),
            RepoState::default(),
            Some(&remote),
            &opts,
        )
        .unwrap();
        assert!(report.success());
        assert_eq!(report.state.meta_version.as_deref(), Some("1.0.0"));
        assert_eq!(report.state.docs.len(), 3);
        assert_eq!(remote.notebooks().len(), 1);
    }

    #[test]
    fn sync_only_run_leaves_a_major_bump_pending() {
        let tmp = repo();
        let remote = MemoryRemote::new();
        let opts = RunOptions {
            mode: RunMode::SyncOnly,
            apply: true,
            ..RunOptions::default()
        };
        let state = RepoState {
            meta_version: Some("0.9.0".into()),
            ..RepoState::default()
        };
        let report = run(
            &tmp.path().join("demo"),
            &Manifest::builtin().unwrap(),
            state,
            Some(&remote),
            &opts,
        )
        .unwrap();
        assert!(report.success());
        assert!(report.major_version_bump);
        assert_eq!(report.state.meta_version.as_deref(), Some("0.9.0"));
        assert_eq!(report.state.docs.len(), 3);
    }

    #[test]
    fn orphaned_ledger_entries_are_pruned_on_apply() {
        let tmp = repo();
        let remote = MemoryRemote::new().with_notebook("nb-1", "demo");
        let title = crate::plan::source_title(&docrefresh_core::RepoKey::from("demo"), "OLD.md");
        let live = remote.seed_source("nb-1", &title, "old");
        let opts = RunOptions {
            mode: RunMode::SyncOnly,
            apply: true,
            ..RunOptions::default()
        };
        let mut state = RepoState {
            notebook_id: Some("nb-1".into()),
            ..RepoState::default()
        };
        let entry = |source: &str| docrefresh_core::DocState {
            fingerprint: docrefresh_core::Fingerprint::from("000000000000"),
            source_id: source.to_owned(),
            updated_at: Utc::now(),
        };
        state.record_doc("VANISHED.md", entry("src-gone"));
        state.record_doc("OLD.md", entry(&live));

        let report = run(
            &tmp.path().join("demo"),
            &Manifest::builtin().unwrap(),
            state,
            Some(&remote),
            &opts,
        )
        .unwrap();
        assert!(report.success());
        assert!(!report.state.docs.contains_key("VANISHED.md"));
        assert_eq!(report.state.docs.len(), 3);
    }
}
