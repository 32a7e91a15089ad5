//! Domain types shared by every docrefresh stage.
//!
//! Filesystem locations use `PathBuf`. A document's identity across runs is its
//! [`DocumentDescriptor::key`], a forward-slash relative path string that is also
//! used as the ledger key and inside remote source titles.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Key identifying a repository: its directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoKey(pub String);

impl RepoKey {
    /// Derive the key from a repository root (`/code/C017_brain-on-tap` → `C017_brain-on-tap`).
    pub fn from_path(repo_path: &Path) -> Self {
        let name = repo_path
            .file_name()
            .unwrap_or(repo_path.as_os_str())
            .to_string_lossy()
            .into_owned();
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Truncated SHA-256 hex digest of a document's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Tier a document definition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocTier {
    /// Minimal required set (README, CHANGELOG, META).
    Core,
    Extended,
    DeepReference,
}

impl DocTier {
    pub const ALL: [DocTier; 3] = [DocTier::Core, DocTier::Extended, DocTier::DeepReference];

    pub fn number(self) -> u8 {
        match self {
            DocTier::Core => 1,
            DocTier::Extended => 2,
            DocTier::DeepReference => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocTier::Core => "Required",
            DocTier::Extended => "Extended",
            DocTier::DeepReference => "Deep Reference",
        }
    }
}

impl fmt::Display for DocTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Repository-level classification by how much canonical documentation exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoTier {
    Simple,
    Complex,
    Kitted,
}

impl fmt::Display for RepoTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoTier::Simple => write!(f, "simple"),
            RepoTier::Complex => write!(f, "complex"),
            RepoTier::Kitted => write!(f, "kitted"),
        }
    }
}

/// Whether a manifest entry names a file or a directory (trailing `/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    #[default]
    File,
    Directory,
}

/// Derived change state of a hashed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    Changed,
    Unchanged,
    /// No stored baseline (or not hashed yet).
    Unknown,
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One expected document in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    /// Path relative to the repository root.
    pub path: PathBuf,
    pub tier: DocTier,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub kind: DocKind,
    pub exists: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_fingerprint: Option<Fingerprint>,
}

impl DocumentDescriptor {
    /// Forward-slash relative path; directories keep their trailing `/`.
    pub fn key(&self) -> String {
        let mut key = path_key(&self.path);
        if self.kind == DocKind::Directory && !key.ends_with('/') {
            key.push('/');
        }
        key
    }

    /// Absolute location of this document under `repo_root`.
    pub fn full_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.path)
    }

    /// Existing, non-directory documents are the only ones fingerprinted and synced.
    pub fn is_hashable(&self) -> bool {
        self.exists && self.kind == DocKind::File
    }

    pub fn change_state(&self) -> ChangeState {
        match (&self.fingerprint, &self.stored_fingerprint) {
            (Some(current), Some(stored)) if current == stored => ChangeState::Unchanged,
            (Some(_), Some(_)) => ChangeState::Changed,
            _ => ChangeState::Unknown,
        }
    }
}

/// Classified inventory of a repository's canonical documents.
///
/// The repository tier is computed from `docs` on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInventory {
    pub repo_path: PathBuf,
    pub repo_key: RepoKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier3_root: Option<PathBuf>,
    pub docs: Vec<DocumentDescriptor>,
}

impl RepositoryInventory {
    /// KITTED beats COMPLEX beats SIMPLE.
    pub fn tier(&self) -> RepoTier {
        let any_exists = |tier: DocTier| self.docs_in(tier).any(|d| d.exists);
        if self.tier3_root.is_some() && any_exists(DocTier::DeepReference) {
            RepoTier::Kitted
        } else if any_exists(DocTier::Extended) {
            RepoTier::Complex
        } else {
            RepoTier::Simple
        }
    }

    pub fn docs_in(&self, tier: DocTier) -> impl Iterator<Item = &DocumentDescriptor> {
        self.docs.iter().filter(move |d| d.tier == tier)
    }

    pub fn existing(&self) -> impl Iterator<Item = &DocumentDescriptor> {
        self.docs.iter().filter(|d| d.exists)
    }

    pub fn hashable(&self) -> impl Iterator<Item = &DocumentDescriptor> {
        self.docs.iter().filter(|d| d.is_hashable())
    }

    pub fn missing_required(&self) -> impl Iterator<Item = &DocumentDescriptor> {
        self.docs.iter().filter(|d| d.required && !d.exists)
    }

    /// Tier-3 root relative to the repository, for display.
    pub fn tier3_root_relative(&self) -> Option<String> {
        let root = self.tier3_root.as_ref()?;
        let rel = root.strip_prefix(&self.repo_path).unwrap_or(root);
        Some(path_key(rel))
    }
}

/// Render a relative path with `/` separators regardless of platform.
pub fn path_key(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
