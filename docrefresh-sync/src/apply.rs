//! Sync plan application.
//!
//! Order is deletes, then updates, then adds. An update uploads the new
//! content and only after that succeeds removes the old record, so a failed
//! upload always leaves the previous copy live. Per-action failures are
//! collected, never propagated.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use docrefresh_core::{DocState, RepoKey, RepoState};
use serde::Serialize;

use crate::fingerprint::content_fingerprint;
use crate::plan::{source_title, SyncAction, SyncActionKind, SyncPlan};
use crate::remote::RemoteStore;

/// A remote record this run deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedSource {
    pub path: String,
    pub source_id: String,
}

/// Result of applying one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SyncOutcome {
    pub notebook_id: Option<String>,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Hard failures: a failed upload, a failed stale delete, unreadable content.
    pub errors: Vec<String>,
    /// Partial successes, e.g. new content live but old copy left behind.
    pub warnings: Vec<String>,
    /// Ledger entries written by successful adds and updates.
    pub ledger: BTreeMap<String, DocState>,
    pub removed: Vec<RemovedSource>,
}

impl SyncOutcome {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold this outcome into the stored state.
    pub fn merge_into(&self, state: &mut RepoState, synced_at: DateTime<Utc>) {
        for removed in &self.removed {
            state.forget_doc(&removed.path, &removed.source_id);
        }
        for (path, entry) in &self.ledger {
            state.record_doc(path.clone(), entry.clone());
        }
        if self.notebook_id.is_some() {
            state.notebook_id = self.notebook_id.clone();
        }
        state.last_sync = Some(synced_at);
    }
}

/// Apply `plan` against `remote`. The plan is consumed.
pub fn apply_sync_plan(remote: &dyn RemoteStore, plan: SyncPlan, repo_path: &Path) -> SyncOutcome {
    let mut outcome = SyncOutcome {
        notebook_id: plan.notebook_id.clone(),
        ..SyncOutcome::default()
    };
    let Some(notebook_id) = plan.notebook_id.as_deref() else {
        outcome.errors.push("No notebook ID available".to_owned());
        return outcome;
    };
    let now = Utc::now();

    for action in plan.of_kind(SyncActionKind::Delete) {
        apply_delete(remote, action, &mut outcome);
    }
    for action in plan.of_kind(SyncActionKind::Update) {
        apply_update(remote, &plan.repo_key, notebook_id, action, repo_path, now, &mut outcome);
    }
    for action in plan.of_kind(SyncActionKind::Add) {
        if let Some(entry) = upload(remote, &plan.repo_key, notebook_id, action, repo_path, now, &mut outcome) {
            tracing::info!("{}: added {} as {}", plan.repo_key, action.path, entry.source_id);
            outcome.added += 1;
            outcome.ledger.insert(action.path.clone(), entry);
        }
    }

    tracing::info!(
        "{}: applied {} add, {} update, {} delete ({} error(s), {} warning(s))",
        plan.repo_key,
        outcome.added,
        outcome.updated,
        outcome.deleted,
        outcome.errors.len(),
        outcome.warnings.len()
    );
    outcome
}

fn apply_delete(remote: &dyn RemoteStore, action: &SyncAction, outcome: &mut SyncOutcome) {
    let Some(source_id) = action.source_id.as_deref() else {
        return;
    };
    match remote.delete_source(source_id) {
        Ok(()) => {
            tracing::info!("deleted {} ({source_id}): {}", action.path, action.reason);
            outcome.deleted += 1;
            outcome.removed.push(RemovedSource {
                path: action.path.clone(),
                source_id: source_id.to_owned(),
            });
        }
        Err(e) => {
            tracing::warn!("failed to delete {} ({source_id}): {e}", action.path);
            outcome
                .errors
                .push(format!("Failed to delete {}: {e}", action.path));
        }
    }
}

fn apply_update(
    remote: &dyn RemoteStore,
    repo_key: &RepoKey,
    notebook_id: &str,
    action: &SyncAction,
    repo_path: &Path,
    now: DateTime<Utc>,
    outcome: &mut SyncOutcome,
) {
    // Upload first: if this fails the old record stays untouched.
    let Some(entry) = upload(remote, repo_key, notebook_id, action, repo_path, now, outcome) else {
        return;
    };
    tracing::info!("{repo_key}: uploaded new {} as {}", action.path, entry.source_id);
    outcome.updated += 1;
    outcome.ledger.insert(action.path.clone(), entry);

    let Some(old_id) = action.source_id.as_deref() else {
        return;
    };
    if let Err(e) = remote.delete_source(old_id) {
        tracing::warn!("{repo_key}: stale copy {old_id} of {} left behind: {e}", action.path);
        outcome.warnings.push(format!(
            "Updated {} but failed to delete old source {old_id}: {e}",
            action.path
        ));
    }
}

/// Read and upload one document; `None` after recording an error.
fn upload(
    remote: &dyn RemoteStore,
    repo_key: &RepoKey,
    notebook_id: &str,
    action: &SyncAction,
    repo_path: &Path,
    now: DateTime<Utc>,
    outcome: &mut SyncOutcome,
) -> Option<DocState> {
    let verb = match action.kind {
        SyncActionKind::Update => "update",
        _ => "add",
    };
    let full = repo_path.join(&action.path);
    let content = match std::fs::read_to_string(&full) {
        Ok(c) => c,
        Err(e) => {
            outcome
                .errors
                .push(format!("Failed to {verb} {}: cannot read {}: {e}", action.path, full.display()));
            return None;
        }
    };

    let uploaded = content_fingerprint(&content);
    if action.fingerprint.as_ref().is_some_and(|planned| planned != &uploaded) {
        tracing::debug!("{} changed between planning and upload", action.path);
    }

    let title = source_title(repo_key, &action.path);
    match remote.add_text_source(notebook_id, &title, &content) {
        Ok(source_id) => Some(DocState {
            fingerprint: uploaded,
            source_id,
            updated_at: now,
        }),
        Err(e) => {
            tracing::warn!("{repo_key}: failed to {verb} {}: {e}", action.path);
            outcome
                .errors
                .push(format!("Failed to {verb} {}: {e}", action.path));
            None
        }
    }
}
