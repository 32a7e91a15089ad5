//! Fingerprinting an inventory and partitioning it by change state.

use docrefresh_core::{ChangeState, DocumentDescriptor, RepositoryInventory};
use serde::Serialize;

use crate::error::SyncError;
use crate::fingerprint::file_fingerprint;

/// Return a copy of `inventory` with `fingerprint` set on every hashable document.
///
/// Entries that exist but turn out to be directories on disk are left unhashed.
pub fn hash_inventory(inventory: &RepositoryInventory) -> Result<RepositoryInventory, SyncError> {
    let mut hashed = inventory.clone();
    for doc in hashed.docs.iter_mut().filter(|d| d.is_hashable()) {
        let path = doc.full_path(&inventory.repo_path);
        if !path.is_file() {
            tracing::debug!("skipping non-file {}", path.display());
            continue;
        }
        doc.fingerprint = Some(file_fingerprint(&path)?);
    }
    Ok(hashed)
}

/// Hashed documents partitioned into changed / unchanged / new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ChangeComparison {
    pub changed: Vec<DocumentDescriptor>,
    pub unchanged: Vec<DocumentDescriptor>,
    /// No stored fingerprint yet.
    pub new_docs: Vec<DocumentDescriptor>,
}

impl ChangeComparison {
    pub fn total(&self) -> usize {
        self.changed.len() + self.unchanged.len() + self.new_docs.len()
    }

    /// `changed / (changed + unchanged)`; new documents never count.
    pub fn change_ratio(&self) -> f64 {
        let tracked = self.changed.len() + self.unchanged.len();
        if tracked == 0 {
            return 0.0;
        }
        self.changed.len() as f64 / tracked as f64
    }

    pub fn is_changed(&self, key: &str) -> bool {
        self.changed.iter().any(|d| d.key() == key)
    }
}

/// Partition every hashed, existing file descriptor of `inventory`.
pub fn compare(inventory: &RepositoryInventory) -> ChangeComparison {
    let mut cmp = ChangeComparison::default();
    for doc in inventory
        .hashable()
        .filter(|d| d.fingerprint.is_some())
    {
        match (doc.stored_fingerprint.is_some(), doc.change_state()) {
            (false, _) => cmp.new_docs.push(doc.clone()),
            (true, ChangeState::Changed) => cmp.changed.push(doc.clone()),
            (true, _) => cmp.unchanged.push(doc.clone()),
        }
    }
    tracing::info!(
        "{}: {} changed, {} unchanged, {} new (ratio {:.3})",
        inventory.repo_key,
        cmp.changed.len(),
        cmp.unchanged.len(),
        cmp.new_docs.len(),
        cmp.change_ratio()
    );
    cmp
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use docrefresh_core::{DocKind, DocTier, Fingerprint, RepoKey};
    use tempfile::TempDir;

    use crate::fingerprint::content_fingerprint;

    fn doc(path: &str, current: Option<&str>, stored: Option<&str>) -> DocumentDescriptor {
        DocumentDescriptor {
            path: PathBuf::from(path),
            tier: DocTier::Core,
            purpose: String::new(),
            kind: DocKind::File,
            exists: true,
            required: false,
            fingerprint: current.map(Fingerprint::from),
            stored_fingerprint: stored.map(Fingerprint::from),
        }
    }

    fn inventory(docs: Vec<DocumentDescriptor>) -> RepositoryInventory {
        RepositoryInventory {
            repo_path: PathBuf::from("/nowhere"),
            repo_key: RepoKey::from("demo"),
            tier3_root: None,
            docs,
        }
    }

    #[test]
    fn partitions_are_exhaustive_and_disjoint() {
        let inv = inventory(vec![
            doc("A.md", Some("aaaaaaaaaaaa"), Some("aaaaaaaaaaaa")),
            doc("B.md", Some("bbbbbbbbbbbb"), Some("000000000000")),
            doc("C.md", Some("cccccccccccc"), None),
        ]);
        let cmp = compare(&inv);
        assert_eq!(cmp.total(), 3);
        assert_eq!(cmp.unchanged[0].key(), "A.md");
        assert_eq!(cmp.changed[0].key(), "B.md");
        assert_eq!(cmp.new_docs[0].key(), "C.md");
    }

    #[test]
    fn unhashed_missing_and_directory_docs_are_excluded() {
        let mut missing = doc("GONE.md", None, Some("aaaaaaaaaaaa"));
        missing.exists = false;
        let mut dir = doc("docs/adr/", None, None);
        dir.kind = DocKind::Directory;
        let unhashed = doc("X.md", None, None);

        let cmp = compare(&inventory(vec![missing, dir, unhashed]));
        assert_eq!(cmp.total(), 0);
        assert_eq!(cmp.change_ratio(), 0.0);
    }

    #[test]
    fn ratio_bounds_and_new_docs_do_not_move_it() {
        let all_same = inventory(vec![
            doc("A.md", Some("a"), Some("a")),
            doc("B.md", Some("b"), Some("b")),
        ]);
        assert_eq!(compare(&all_same).change_ratio(), 0.0);

        let all_changed = inventory(vec![
            doc("A.md", Some("a"), Some("x")),
            doc("B.md", Some("b"), Some("y")),
        ]);
        assert_eq!(compare(&all_changed).change_ratio(), 1.0);

        let mut half = vec![
            doc("A.md", Some("a"), Some("x")),
            doc("B.md", Some("b"), Some("b")),
        ];
        let before = compare(&inventory(half.clone())).change_ratio();
        half.push(doc("NEW1.md", Some("n"), None));
        half.push(doc("NEW2.md", Some("m"), None));
        let after = compare(&inventory(half)).change_ratio();
        assert_eq!(before, 0.5);
        assert_eq!(before, after);
    }

    #[test]
    fn hash_inventory_is_a_pure_transform() {
        let repo = TempDir::new().unwrap();
        std::fs::write(repo.path().join("README.md"), "# Readme\n").unwrap();
        std::fs::create_dir_all(repo.path().join("CHANGELOG.md")).unwrap();
        let mut inv = inventory(vec![
            doc("README.md", None, None),
            doc("CHANGELOG.md", None, None),
        ]);
        inv.repo_path = repo.path().to_path_buf();

        let hashed = hash_inventory(&inv).unwrap();
        assert!(inv.docs.iter().all(|d| d.fingerprint.is_none()));
        assert_eq!(
            hashed.docs[0].fingerprint,
            Some(content_fingerprint("# Readme\n"))
        );
        assert!(hashed.docs[1].fingerprint.is_none());
    }
}
