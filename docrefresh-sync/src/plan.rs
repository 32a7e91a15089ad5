//! Sync planning: the minimal add/update/delete set that brings a notebook's
//! sources into line with the local documents.
//!
//! Remote records are matched to documents through their deterministic title,
//! `DOC: {repo_key} :: {relative_path}`, so no separate mapping table is needed.

use std::collections::{BTreeMap, BTreeSet};

use docrefresh_core::{DocState, Fingerprint, RepoKey, RepositoryInventory};
use serde::Serialize;

use crate::change::ChangeComparison;
use crate::remote::RemoteSource;

const TITLE_PREFIX: &str = "DOC: ";
const TITLE_SEPARATOR: &str = " :: ";

pub const REASON_CHANGED: &str = "Content changed";
pub const REASON_UNTRACKED: &str = "Remote copy not in ledger";
pub const REASON_NEW: &str = "New document";
pub const REASON_MISSING: &str = "Missing from notebook";
pub const REASON_REMOVED: &str = "Document removed from repo";
pub const REASON_DUPLICATE: &str = "Duplicate remote copy";

/// Remote title for a document.
pub fn source_title(repo_key: &RepoKey, doc_key: &str) -> String {
    format!("{TITLE_PREFIX}{repo_key}{TITLE_SEPARATOR}{doc_key}")
}

/// Reverse of [`source_title`]: `(repo_key, relative_path)`, or `None` for
/// titles this tool did not produce.
pub fn parse_source_title(title: &str) -> Option<(&str, &str)> {
    let rest = title.strip_prefix(TITLE_PREFIX)?;
    let (repo, path) = rest.split_once(TITLE_SEPARATOR)?;
    if repo.is_empty() || path.is_empty() {
        return None;
    }
    Some((repo, path))
}

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncActionKind {
    Add,
    Update,
    Delete,
}

/// One instruction for the applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncAction {
    pub kind: SyncActionKind,
    /// Ledger key of the document (forward-slash relative path).
    pub path: String,
    pub reason: String,
    /// Existing remote record, for update and delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Fingerprint being uploaded, for add and update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub repo_key: RepoKey,
    pub notebook_id: Option<String>,
    pub notebook_exists: bool,
    pub actions: Vec<SyncAction>,
}

impl SyncPlan {
    pub fn of_kind(&self, kind: SyncActionKind) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(move |a| a.kind == kind)
    }

    pub fn count(&self, kind: SyncActionKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn needs_create(&self) -> bool {
        !self.notebook_exists
    }

    pub fn has_changes(&self) -> bool {
        !self.actions.is_empty() || self.needs_create()
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Compute the sync plan for one repository.
///
/// `ledger` is the stored per-path state; when several remote records map to
/// one path it decides which copy is live.
pub fn compute_sync_plan(
    inventory: &RepositoryInventory,
    comparison: &ChangeComparison,
    notebook_id: Option<&str>,
    remote_sources: &[RemoteSource],
    ledger: &BTreeMap<String, DocState>,
) -> SyncPlan {
    let repo_key = &inventory.repo_key;
    let mut actions = Vec::new();

    // path -> live record; extra copies are scheduled for deletion.
    let mut live: BTreeMap<&str, &RemoteSource> = BTreeMap::new();
    let mut duplicates: Vec<(&str, &RemoteSource)> = Vec::new();
    for source in remote_sources {
        let Some((repo, path)) = parse_source_title(&source.title) else {
            continue;
        };
        if repo != repo_key.as_str() {
            continue;
        }
        match live.get(path).copied() {
            None => {
                live.insert(path, source);
            }
            Some(current) => {
                let ledger_id = ledger.get(path).map(|e| e.source_id.as_str());
                if ledger_id == Some(source.id.as_str()) {
                    duplicates.push((path, current));
                    live.insert(path, source);
                } else {
                    duplicates.push((path, source));
                }
            }
        }
    }

    let changed: BTreeSet<String> = comparison.changed.iter().map(|d| d.key()).collect();
    for doc in inventory.hashable() {
        let Some(fingerprint) = &doc.fingerprint else {
            continue;
        };
        let key = doc.key();
        match live.remove(key.as_str()) {
            Some(existing) => {
                let reason = if changed.contains(&key) {
                    REASON_CHANGED
                } else if doc.stored_fingerprint.is_none() {
                    REASON_UNTRACKED
                } else {
                    continue;
                };
                actions.push(SyncAction {
                    kind: SyncActionKind::Update,
                    path: key,
                    reason: reason.to_owned(),
                    source_id: Some(existing.id.clone()),
                    fingerprint: Some(fingerprint.clone()),
                });
            }
            None => {
                let reason = if doc.stored_fingerprint.is_none() {
                    REASON_NEW
                } else {
                    REASON_MISSING
                };
                actions.push(SyncAction {
                    kind: SyncActionKind::Add,
                    path: key,
                    reason: reason.to_owned(),
                    source_id: None,
                    fingerprint: Some(fingerprint.clone()),
                });
            }
        }
    }

    let stale = live
        .into_iter()
        .map(|(path, source)| (path, source, REASON_REMOVED));
    let extra = duplicates
        .into_iter()
        .map(|(path, source)| (path, source, REASON_DUPLICATE));
    for (path, source, reason) in stale.chain(extra) {
        actions.push(SyncAction {
            kind: SyncActionKind::Delete,
            path: path.to_owned(),
            reason: reason.to_owned(),
            source_id: Some(source.id.clone()),
            fingerprint: None,
        });
    }

    let plan = SyncPlan {
        repo_key: repo_key.clone(),
        notebook_id: notebook_id.map(str::to_owned),
        notebook_exists: notebook_id.is_some(),
        actions,
    };
    tracing::info!(
        "{repo_key}: plan {} add, {} update, {} delete{}",
        plan.count(SyncActionKind::Add),
        plan.count(SyncActionKind::Update),
        plan.count(SyncActionKind::Delete),
        if plan.needs_create() { ", notebook to create" } else { "" }
    );
    plan
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
