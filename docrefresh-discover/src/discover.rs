//! Manifest-driven document discovery.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use docrefresh_core::{
    DocTier, DocumentDef, DocumentDescriptor, Fingerprint, Manifest, RepoKey,
    RepositoryInventory,
};

use crate::error::{io_err, DiscoverError};

/// Discover the canonical documents of the repository at `repo_path`.
///
/// `stored` maps ledger keys to fingerprints from the previous sync; it seeds
/// each descriptor's `stored_fingerprint`.
pub fn discover_repo(
    repo_path: &Path,
    manifest: &Manifest,
    stored: &BTreeMap<String, Fingerprint>,
) -> Result<RepositoryInventory, DiscoverError> {
    check_repo_dir(repo_path)?;
    let repo_key = RepoKey::from_path(repo_path);

    let mut docs = Vec::new();
    for tier in [DocTier::Core, DocTier::Extended] {
        for def in manifest.documents(tier) {
            docs.push(discover_doc(repo_path, repo_path, def, tier, stored));
        }
    }

    let tier3_root = manifest.resolve_tier3_root(repo_path, repo_key.as_str());
    match &tier3_root {
        Some(root) => {
            tracing::debug!("{repo_key}: tier-3 root {}", root.display());
            for def in manifest.documents(DocTier::DeepReference) {
                docs.push(discover_doc(
                    repo_path,
                    root,
                    def,
                    DocTier::DeepReference,
                    stored,
                ));
            }
        }
        None => tracing::debug!("{repo_key}: no tier-3 root"),
    }

    let inventory = RepositoryInventory {
        repo_path: repo_path.to_path_buf(),
        repo_key,
        tier3_root,
        docs,
    };
    tracing::info!(
        "{}: discovered {}/{} documents, tier {}",
        inventory.repo_key,
        inventory.existing().count(),
        inventory.docs.len(),
        inventory.tier()
    );
    Ok(inventory)
}

fn check_repo_dir(repo_path: &Path) -> Result<(), DiscoverError> {
    match std::fs::metadata(repo_path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(DiscoverError::NotADirectory {
            path: repo_path.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(DiscoverError::RepoNotFound {
            path: repo_path.to_path_buf(),
        }),
        Err(e) => Err(io_err(repo_path, e)),
    }
}

/// Resolve one definition under `base`, falling back to its alternate names.
///
/// Directory entries are never probed for alternates. The descriptor path is
/// always relative to `repo_path`.
fn discover_doc(
    repo_path: &Path,
    base: &Path,
    def: &DocumentDef,
    tier: DocTier,
    stored: &BTreeMap<String, Fingerprint>,
) -> DocumentDescriptor {
    let kind = def.kind();
    let mut found = base.join(&def.path);
    let mut exists = found.exists();

    if !exists && kind == docrefresh_core::DocKind::File {
        if let Some(alt) = def
            .alternate_names
            .iter()
            .map(|name| base.join(name))
            .find(|p| p.exists())
        {
            found = alt;
            exists = true;
        }
    }

    let rel = relative_to(&found, repo_path);
    let mut doc = DocumentDescriptor {
        path: rel,
        tier,
        purpose: def.purpose.clone(),
        kind,
        exists,
        required: def.required,
        fingerprint: None,
        stored_fingerprint: None,
    };
    doc.stored_fingerprint = stored.get(&doc.key()).cloned();
    doc
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use docrefresh_core::DocKind;
    use tempfile::TempDir;

    fn manifest(yaml: &str) -> Manifest {
        serde_yaml::from_str(yaml).expect("manifest")
    }

    #[test]
    fn missing_repo_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = discover_repo(
            &tmp.path().join("gone"),
            &Manifest::builtin().unwrap(),
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DiscoverError::RepoNotFound { .. }));
    }

    #[test]
    fn file_as_repo_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("README.md");
        std::fs::write(&file, "x").unwrap();
        let err = discover_repo(&file, &Manifest::builtin().unwrap(), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, DiscoverError::NotADirectory { .. }));
    }

    #[test]
    fn alternate_name_is_adopted() {
        let repo = TempDir::new().unwrap();
        std::fs::write(repo.path().join("SECURITY_AND_PRIVACY.md"), "# S").unwrap();
        let m = manifest(
            "tiers:\n  tier2:\n    documents:\n      - path: SECURITY.md\n        alternate_names: [SECURITY_AND_PRIVACY.md]\n",
        );

        let inv = discover_repo(repo.path(), &m, &BTreeMap::new()).unwrap();
        assert_eq!(inv.docs.len(), 1);
        assert_eq!(inv.docs[0].key(), "SECURITY_AND_PRIVACY.md");
        assert!(inv.docs[0].exists);
    }

    #[test]
    fn directory_entry_is_not_probed_for_alternates() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join("decisions")).unwrap();
        let m = manifest(
            "tiers:\n  tier2:\n    documents:\n      - path: docs/adr/\n        alternate_names: [decisions/]\n",
        );

        let inv = discover_repo(repo.path(), &m, &BTreeMap::new()).unwrap();
        assert_eq!(inv.docs[0].kind, DocKind::Directory);
        assert!(!inv.docs[0].exists);
        assert_eq!(inv.docs[0].key(), "docs/adr/");
    }

    #[test]
    fn tier3_paths_are_relative_to_repo_root() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir_all(repo.path().join("docs")).unwrap();
        std::fs::write(repo.path().join("docs/OVERVIEW.md"), "# O").unwrap();
        let m = manifest(
            "tiers:\n  tier3:\n    documents:\n      - path: OVERVIEW.md\n      - path: API.md\n",
        );

        let inv = discover_repo(repo.path(), &m, &BTreeMap::new()).unwrap();
        let keys: Vec<String> = inv.docs.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["docs/OVERVIEW.md", "docs/API.md"]);
        assert_eq!(inv.tier3_root_relative().as_deref(), Some("docs"));
    }

    #[test]
    fn stored_fingerprint_is_attached_by_key() {
        let repo = TempDir::new().unwrap();
        std::fs::write(repo.path().join("README.md"), "# R").unwrap();
        let mut stored = BTreeMap::new();
        stored.insert("README.md".to_owned(), Fingerprint::from("abcdefabcdef"));

        let inv = discover_repo(repo.path(), &Manifest::builtin().unwrap(), &stored).unwrap();
        let readme = inv.docs.iter().find(|d| d.key() == "README.md").unwrap();
        assert_eq!(
            readme.stored_fingerprint,
            Some(Fingerprint::from("abcdefabcdef"))
        );
        assert!(readme.fingerprint.is_none());
    }
}
