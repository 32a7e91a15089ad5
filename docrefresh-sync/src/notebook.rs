//! Locating (or creating) the notebook a repository syncs into.

use docrefresh_core::RepoKey;

use crate::remote::{RemoteResult, RemoteStore};

/// `{repo_key} Documentation`
pub fn notebook_title(repo_key: &RepoKey) -> String {
    format!("{repo_key} Documentation")
}

/// Result of notebook resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotebookResolution {
    /// The stored id is still valid.
    Stored(String),
    /// Found by title; the stored id was missing or stale.
    Adopted(String),
    Created(String),
    /// Nothing exists and creation was not allowed (dry run).
    Missing,
}

impl NotebookResolution {
    pub fn id(&self) -> Option<&str> {
        match self {
            NotebookResolution::Stored(id)
            | NotebookResolution::Adopted(id)
            | NotebookResolution::Created(id) => Some(id),
            NotebookResolution::Missing => None,
        }
    }
}

/// Verify `stored_id`, else adopt a notebook by title, else create one when
/// `create` is set.
pub fn ensure_notebook(
    remote: &dyn RemoteStore,
    repo_key: &RepoKey,
    stored_id: Option<&str>,
    create: bool,
) -> RemoteResult<NotebookResolution> {
    if let Some(id) = stored_id {
        if remote.get_notebook(id)?.is_some() {
            return Ok(NotebookResolution::Stored(id.to_owned()));
        }
        tracing::warn!("{repo_key}: stored notebook {id} no longer exists");
    }

    let title = notebook_title(repo_key);
    if let Some(found) = remote
        .list_notebooks()?
        .into_iter()
        .find(|n| n.title == title)
    {
        tracing::info!("{repo_key}: adopting notebook {} by title", found.id);
        return Ok(NotebookResolution::Adopted(found.id));
    }

    if !create {
        return Ok(NotebookResolution::Missing);
    }
    let created = remote.create_notebook(&title)?;
    tracing::info!("{repo_key}: created notebook {}", created.id);
    Ok(NotebookResolution::Created(created.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{Call, MemoryRemote};

    #[test]
    fn stored_id_is_verified_first() {
        let remote = MemoryRemote::new().with_notebook("nb-1", "other title");
        let res = ensure_notebook(&remote, &RepoKey::from("demo"), Some("nb-1"), true).unwrap();
        assert_eq!(res, NotebookResolution::Stored("nb-1".into()));
        assert_eq!(remote.calls(), vec![Call::GetNotebook("nb-1".into())]);
    }

    #[test]
    fn stale_id_falls_back_to_title_match() {
        let remote = MemoryRemote::new().with_notebook("nb-7", "demo Documentation");
        let res = ensure_notebook(&remote, &RepoKey::from("demo"), Some("nb-gone"), true).unwrap();
        assert_eq!(res, NotebookResolution::Adopted("nb-7".into()));
    }

    #[test]
    fn dry_run_never_creates() {
        let remote = MemoryRemote::new();
        let res = ensure_notebook(&remote, &RepoKey::from("demo"), None, false).unwrap();
        assert_eq!(res, NotebookResolution::Missing);
        assert!(remote.notebooks().is_empty());
    }

    #[test]
    fn apply_creates_titled_notebook() {
        let remote = MemoryRemote::new();
        let res = ensure_notebook(&remote, &RepoKey::from("demo"), None, true).unwrap();
        let id = res.id().unwrap().to_owned();
        assert!(matches!(res, NotebookResolution::Created(_)));
        assert_eq!(remote.notebooks()[0].id, id);
        assert_eq!(remote.notebooks()[0].title, "demo Documentation");
    }
}
