//! Canonical document manifest.
//!
//! # Lookup order
//!
//! 1. An explicit path (`--manifest`). Must exist.
//! 2. `<home>/.docrefresh/canonical_docs.yaml` if present.
//! 3. The built-in default compiled into this crate.
//!
//! # API pattern
//!
//! `fn_at(home: &Path, …)` takes an explicit home; the no-arg wrappers resolve
//! `dirs::home_dir()` and delegate. Tests must only call the `_at` forms.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{DocKind, DocTier};

/// Built-in manifest, also written out by `init_at`.
pub const DEFAULT_MANIFEST: &str = include_str!("canonical_docs.yaml");

const MANIFEST_FILE: &str = "canonical_docs.yaml";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single expected document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDef {
    pub path: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_names: Vec<String>,
}

impl DocumentDef {
    pub fn kind(&self) -> DocKind {
        if self.path.ends_with('/') {
            DocKind::Directory
        } else {
            DocKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TierSection {
    #[serde(default)]
    pub documents: Vec<DocumentDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Tiers {
    #[serde(default)]
    pub tier1: TierSection,
    #[serde(default)]
    pub tier2: TierSection,
    #[serde(default)]
    pub tier3: TierSection,
}

/// Per-repository tier-3 override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepoOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier3_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub tiers: Tiers,
    #[serde(default = "default_tier3_candidates")]
    pub tier3_candidates: Vec<String>,
    #[serde(default)]
    pub repo_overrides: BTreeMap<String, RepoOverride>,
}

fn default_tier3_candidates() -> Vec<String> {
    vec!["docs/".to_owned()]
}

impl Manifest {
    /// Parse the built-in default manifest.
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(DEFAULT_MANIFEST)?)
    }

    pub fn documents(&self, tier: DocTier) -> &[DocumentDef] {
        match tier {
            DocTier::Core => &self.tiers.tier1.documents,
            DocTier::Extended => &self.tiers.tier2.documents,
            DocTier::DeepReference => &self.tiers.tier3.documents,
        }
    }

    /// Resolve the deep-reference root for a repository.
    ///
    /// An override is honoured only when its path exists; otherwise candidates
    /// are probed in order with `{repo_name}` expanded to [`short_name`].
    pub fn resolve_tier3_root(&self, repo_path: &Path, repo_name: &str) -> Option<PathBuf> {
        if let Some(root) = self
            .repo_overrides
            .get(repo_name)
            .and_then(|o| o.tier3_root.as_ref())
        {
            let path = repo_path.join(root);
            if path.exists() {
                return Some(path);
            }
        }

        let short = short_name(repo_name);
        self.tier3_candidates
            .iter()
            .map(|candidate| repo_path.join(candidate.replace("{repo_name}", &short)))
            .find(|path| path.exists())
    }
}

/// Strip a leading `<letter><digits>_` token and normalise `-` to `_`.
///
/// `C017_brain-on-tap` → `brain_on_tap`, `some-repo` → `some_repo`.
pub fn short_name(repo_name: &str) -> String {
    let name = match repo_name.split_once('_') {
        Some((prefix, rest)) if is_code_prefix(prefix) => rest,
        _ => repo_name,
    };
    name.replace('-', "_")
}

fn is_code_prefix(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() => {
            let digits = chars.as_str();
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.docrefresh/canonical_docs.yaml`. Pure, no I/O.
pub fn manifest_path_at(home: &Path) -> PathBuf {
    home.join(".docrefresh").join(MANIFEST_FILE)
}

/// Load and parse a manifest file.
///
/// Returns `ConfigError::ManifestNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<Manifest, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ManifestNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the manifest following the lookup order in the module docs.
pub fn resolve_at(home: &Path, explicit: Option<&Path>) -> Result<Manifest, ConfigError> {
    if let Some(path) = explicit {
        return load_from(path);
    }
    let installed = manifest_path_at(home);
    if installed.exists() {
        return load_from(&installed);
    }
    Manifest::builtin()
}

/// `resolve_at` convenience wrapper.
pub fn resolve(explicit: Option<&Path>) -> Result<Manifest, ConfigError> {
    resolve_at(&home()?, explicit)
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

/// Outcome of writing the default manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitResult {
    Written(PathBuf),
    AlreadyPresent(PathBuf),
}

/// Write the built-in manifest to `<home>/.docrefresh/canonical_docs.yaml`.
///
/// Idempotent: an existing file is left alone unless `force` is set.
pub fn init_at(home: &Path, force: bool) -> Result<InitResult, ConfigError> {
    let path = manifest_path_at(home);
    if path.exists() && !force {
        return Ok(InitResult::AlreadyPresent(path));
    }
    crate::state::ensure_dir(home.join(".docrefresh").as_path())?;
    crate::state::write_atomic(&path, DEFAULT_MANIFEST)?;
    Ok(InitResult::Written(path))
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<InitResult, ConfigError> {
    init_at(&home()?, force)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("C017_brain-on-tap", "brain_on_tap")]
    #[case("P051_mcp-servers", "mcp_servers")]
    #[case("some-repo", "some_repo")]
    #[case("my_project", "my_project")]
    #[case("C_thing", "C_thing")]
    #[case("017_thing", "017_thing")]
    fn short_name_strips_code_prefix(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(short_name(input), expected);
    }

    #[test]
    fn builtin_manifest_parses() {
        let m = Manifest::builtin().expect("builtin");
        let core: Vec<&str> = m
            .documents(DocTier::Core)
            .iter()
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(core, vec!["README.md", "CHANGELOG.md", "META.yaml"]);
        assert!(m.documents(DocTier::Core).iter().all(|d| d.required));
        assert!(!m.documents(DocTier::DeepReference).is_empty());
    }

    #[test]
    fn candidates_default_to_docs_dir() {
        let m: Manifest = serde_yaml::from_str("tiers: {}\n").unwrap();
        assert_eq!(m.tier3_candidates, vec!["docs/"]);
        assert!(m.repo_overrides.is_empty());
    }

    #[test]
    fn resolve_tier3_uses_existing_override() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join("handbook")).unwrap();
        std::fs::create_dir_all(repo.path().join("docs")).unwrap();
        let yaml = "repo_overrides:\n  C017_demo:\n    tier3_root: handbook/\n";
        let m: Manifest = serde_yaml::from_str(yaml).unwrap();

        let root = m.resolve_tier3_root(repo.path(), "C017_demo").unwrap();
        assert_eq!(root, repo.path().join("handbook/"));
    }

    #[test]
    fn resolve_tier3_falls_through_missing_override() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join("docs")).unwrap();
        let yaml = "repo_overrides:\n  demo:\n    tier3_root: nowhere/\n";
        let m: Manifest = serde_yaml::from_str(yaml).unwrap();

        let root = m.resolve_tier3_root(repo.path(), "demo").unwrap();
        assert_eq!(root, repo.path().join("docs/"));
    }

    #[test]
    fn resolve_tier3_expands_repo_name_template() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join("docs/brain_on_tap")).unwrap();
        let yaml = "tier3_candidates: [\"docs/{repo_name}/\", \"docs/\"]\n";
        let m: Manifest = serde_yaml::from_str(yaml).unwrap();

        let root = m
            .resolve_tier3_root(repo.path(), "C017_brain-on-tap")
            .unwrap();
        assert_eq!(root, repo.path().join("docs/brain_on_tap/"));
    }

    #[test]
    fn resolve_tier3_none_when_nothing_exists() {
        let repo = TempDir::new().unwrap();
        let m = Manifest::builtin().unwrap();
        assert!(m.resolve_tier3_root(repo.path(), "demo").is_none());
    }

    #[test]
    fn explicit_missing_manifest_is_an_error() {
        let home = TempDir::new().unwrap();
        let missing = home.path().join("nope.yaml");
        let err = resolve_at(home.path(), Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::ManifestNotFound { .. }));
    }

    #[test]
    fn resolve_falls_back_to_builtin() {
        let home = TempDir::new().unwrap();
        let m = resolve_at(home.path(), None).unwrap();
        assert_eq!(m, Manifest::builtin().unwrap());
    }

    #[test]
    fn init_is_idempotent() {
        let home = TempDir::new().unwrap();
        let first = init_at(home.path(), false).unwrap();
        assert!(matches!(first, InitResult::Written(_)));
        let second = init_at(home.path(), false).unwrap();
        assert!(matches!(second, InitResult::AlreadyPresent(_)));
        let loaded = resolve_at(home.path(), None).unwrap();
        assert_eq!(loaded, Manifest::builtin().unwrap());
    }
}
