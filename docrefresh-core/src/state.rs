//! Per-repository stored state: the ledger that makes sync idempotent.
//!
//! # Storage layout
//!
//! ```text
//! ~/.docrefresh/
//!   canonical_docs.yaml       (optional manifest override)
//!   state/
//!     <repo_key>.yaml         (one file per repository, mode 0600)
//! ```
//!
//! Writes go to a `.yaml.tmp` sibling, get `chmod 0600`, then `rename` over
//! the target. A legacy layout carrying a flat `doc_hashes` map is migrated on
//! load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{Fingerprint, RepoKey};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Ledger entry for one synced document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocState {
    #[serde(rename = "hash")]
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub source_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Record of an artifact this tool asked the remote to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepoState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// `version` from META.yaml as of the last clean sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_version: Option<String>,
    #[serde(default)]
    pub docs: BTreeMap<String, DocState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, ArtifactState>,
}

impl RepoState {
    /// Path → stored fingerprint, the baseline for change detection.
    pub fn stored_fingerprints(&self) -> BTreeMap<String, Fingerprint> {
        self.docs
            .iter()
            .map(|(path, entry)| (path.clone(), entry.fingerprint.clone()))
            .collect()
    }

    /// Remote source id recorded for `path`, if any.
    pub fn source_id_for(&self, path: &str) -> Option<&str> {
        self.docs
            .get(path)
            .map(|e| e.source_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn record_doc(&mut self, path: impl Into<String>, entry: DocState) {
        self.docs.insert(path.into(), entry);
    }

    /// Drop the entry for `path` only if it still points at `source_id`.
    ///
    /// Deleting a duplicate remote copy must not erase the live entry.
    pub fn forget_doc(&mut self, path: &str, source_id: &str) -> bool {
        let matches = self
            .docs
            .get(path)
            .is_some_and(|e| e.source_id.is_empty() || e.source_id == source_id);
        if matches {
            self.docs.remove(path);
        }
        matches
    }

    /// Drop every entry `keep` rejects and return the dropped paths.
    pub fn prune_docs(&mut self, mut keep: impl FnMut(&str, &DocState) -> bool) -> Vec<String> {
        let mut pruned = Vec::new();
        self.docs.retain(|path, entry| {
            let kept = keep(path, entry);
            if !kept {
                pruned.push(path.clone());
            }
            kept
        });
        pruned
    }

    pub fn record_artifact(&mut self, key: impl Into<String>, entry: ArtifactState) {
        self.artifacts.insert(key.into(), entry);
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StateCompat {
    Legacy(LegacyState),
    Structured(RepoState),
}

#[derive(Debug, Deserialize)]
struct LegacyState {
    #[serde(default)]
    notebook_id: Option<String>,
    #[serde(default)]
    last_sync: Option<DateTime<Utc>>,
    doc_hashes: BTreeMap<String, String>,
}

impl From<LegacyState> for RepoState {
    fn from(legacy: LegacyState) -> Self {
        let now = Utc::now();
        let docs = legacy
            .doc_hashes
            .into_iter()
            .map(|(path, hash)| {
                let entry = DocState {
                    fingerprint: Fingerprint(hash),
                    source_id: String::new(),
                    updated_at: legacy.last_sync.unwrap_or(now),
                };
                (path, entry)
            })
            .collect();
        RepoState {
            notebook_id: legacy.notebook_id,
            last_sync: legacy.last_sync,
            meta_version: None,
            docs,
            artifacts: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.docrefresh/state/<repo_key>.yaml`. Pure, no I/O.
pub fn state_path_at(home: &Path, repo: &RepoKey) -> PathBuf {
    state_dir_at(home).join(format!("{}.yaml", repo.0))
}

pub fn state_dir_at(home: &Path) -> PathBuf {
    home.join(".docrefresh").join("state")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the stored state for `repo`.
///
/// A missing or empty file yields the default (empty) state.
pub fn load_at(home: &Path, repo: &RepoKey) -> Result<RepoState, ConfigError> {
    let path = state_path_at(home, repo);
    if !path.exists() {
        return Ok(RepoState::default());
    }
    parse_file(&path)
}

/// `load_at` convenience wrapper.
pub fn load(repo: &RepoKey) -> Result<RepoState, ConfigError> {
    load_at(&home()?, repo)
}

fn parse_file(path: &Path) -> Result<RepoState, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(RepoState::default());
    }
    let compat: StateCompat =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match compat {
        StateCompat::Legacy(legacy) => legacy.into(),
        StateCompat::Structured(state) => state,
    })
}

/// Atomically save the state for `repo`.
pub fn save_at(home: &Path, repo: &RepoKey, state: &RepoState) -> Result<(), ConfigError> {
    ensure_dir(&state_dir_at(home))?;
    let yaml = serde_yaml::to_string(state)?;
    write_atomic(&state_path_at(home, repo), &yaml)
}

/// `save_at` convenience wrapper.
pub fn save(repo: &RepoKey, state: &RepoState) -> Result<(), ConfigError> {
    save_at(&home()?, repo, state)
}

/// Every stored state under `<home>/.docrefresh/state/`, sorted by repo key.
pub fn list_at(home: &Path) -> Result<Vec<(RepoKey, RepoState)>, ConfigError> {
    let dir = state_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".yaml"))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = RepoKey::from(name.trim_end_matches(".yaml"));
        result.push((key, parse_file(&entry.path())?));
    }
    Ok(result)
}

/// `list_at` convenience wrapper.
pub fn list() -> Result<Vec<(RepoKey, RepoState)>, ConfigError> {
    list_at(&home()?)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

/// Create `dir` (mode `0700`) if it does not exist yet.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    set_permissions(dir, 0o700)
}

/// `.tmp` sibling → `chmod 0600` → `rename`. Same directory, so same filesystem.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    set_permissions(&tmp, 0o600)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> RepoKey {
        RepoKey::from("C017_demo")
    }

    fn entry(hash: &str, source: &str) -> DocState {
        DocState {
            fingerprint: Fingerprint::from(hash),
            source_id: source.to_owned(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn state_path_is_correct() {
        let home = TempDir::new().unwrap();
        let path = state_path_at(home.path(), &key());
        assert!(path.ends_with(".docrefresh/state/C017_demo.yaml"));
    }

    #[test]
    fn empty_state_when_file_missing() {
        let home = TempDir::new().unwrap();
        let state = load_at(home.path(), &key()).unwrap();
        assert_eq!(state, RepoState::default());
    }

    #[test]
    fn roundtrip_save_load() {
        let home = TempDir::new().unwrap();
        let mut state = RepoState {
            notebook_id: Some("nb-1".into()),
            last_sync: Some(Utc::now()),
            meta_version: Some("2.0.0".into()),
            ..RepoState::default()
        };
        state.record_doc("README.md", entry("a1b2c3d4e5f6", "src-1"));

        save_at(home.path(), &key(), &state).unwrap();
        let loaded = load_at(home.path(), &key()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn saved_file_uses_hash_field_name() {
        let home = TempDir::new().unwrap();
        let mut state = RepoState::default();
        state.record_doc("README.md", entry("a1b2c3d4e5f6", "src-1"));
        save_at(home.path(), &key(), &state).unwrap();

        let raw = std::fs::read_to_string(state_path_at(home.path(), &key())).unwrap();
        assert!(raw.contains("hash: a1b2c3d4e5f6"), "{raw}");
    }

    #[test]
    fn tmp_file_cleaned_up_and_mode_restricted() {
        let home = TempDir::new().unwrap();
        save_at(home.path(), &key(), &RepoState::default()).unwrap();
        let path = state_path_at(home.path(), &key());
        assert!(!path.with_file_name("C017_demo.yaml.tmp").exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn legacy_doc_hashes_migrate_to_ledger() {
        let home = TempDir::new().unwrap();
        let path = state_path_at(home.path(), &key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "notebook_id: nb-legacy\ndoc_hashes:\n  README.md: deadbeef0000\n",
        )
        .unwrap();

        let loaded = load_at(home.path(), &key()).unwrap();
        assert_eq!(loaded.notebook_id.as_deref(), Some("nb-legacy"));
        assert_eq!(
            loaded.stored_fingerprints().get("README.md"),
            Some(&Fingerprint::from("deadbeef0000"))
        );
        assert_eq!(loaded.source_id_for("README.md"), None);
    }

    #[test]
    fn malformed_state_reports_path() {
        let home = TempDir::new().unwrap();
        let path = state_path_at(home.path(), &key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "docs: [unclosed").unwrap();

        let err = load_at(home.path(), &key()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn forget_doc_only_removes_matching_source() {
        let mut state = RepoState::default();
        state.record_doc("README.md", entry("aaaaaaaaaaaa", "src-live"));

        assert!(!state.forget_doc("README.md", "src-duplicate"));
        assert!(state.docs.contains_key("README.md"));

        assert!(state.forget_doc("README.md", "src-live"));
        assert!(state.docs.is_empty());
    }

    #[test]
    fn prune_docs_reports_dropped_paths() {
        let mut state = RepoState::default();
        state.record_doc("README.md", entry("aaaaaaaaaaaa", "src-1"));
        state.record_doc("GONE.md", entry("bbbbbbbbbbbb", "src-2"));
        state.record_doc("ALSO_GONE.md", entry("cccccccccccc", ""));

        let pruned = state.prune_docs(|path, _| path == "README.md");
        assert_eq!(pruned, vec!["ALSO_GONE.md", "GONE.md"]);
        assert_eq!(state.docs.keys().collect::<Vec<_>>(), ["README.md"]);
        assert!(state.prune_docs(|_, _| true).is_empty());
    }

    #[test]
    fn list_returns_sorted_states() {
        let home = TempDir::new().unwrap();
        save_at(home.path(), &RepoKey::from("zeta"), &RepoState::default()).unwrap();
        save_at(home.path(), &RepoKey::from("alpha"), &RepoState::default()).unwrap();

        let keys: Vec<String> = list_at(home.path())
            .unwrap()
            .into_iter()
            .map(|(k, _)| k.0)
            .collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }
}
