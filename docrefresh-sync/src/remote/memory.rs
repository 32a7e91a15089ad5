//! In-memory [`RemoteStore`] with failure injection and a call log.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{ArtifactStatus, NotebookInfo, RemoteError, RemoteResult, RemoteSource, RemoteStore};
use crate::artifact::StudioRequest;

/// A remote call as observed by [`MemoryRemote`], in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListNotebooks,
    GetNotebook(String),
    CreateNotebook(String),
    ListSources(String),
    AddSource(String),
    DeleteSource(String),
    GenerateMindMap,
    SaveMindMap(String),
    CreateArtifact(StudioRequest),
    Poll,
}

#[derive(Debug, Default)]
struct Inner {
    notebooks: Vec<NotebookInfo>,
    sources: BTreeMap<String, Vec<RemoteSource>>,
    contents: BTreeMap<String, String>,
    artifacts: BTreeMap<String, Vec<ArtifactStatus>>,
    next_id: u64,
    calls: Vec<Call>,
    fail_add: Vec<String>,
    fail_delete: HashSet<String>,
    fail_polls: usize,
    polls_until_complete: usize,
    polls: usize,
    omit_artifact_ids: bool,
    no_mind_maps: bool,
}

impl Inner {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn notebook_exists(&self, id: &str) -> bool {
        self.notebooks.iter().any(|n| n.id == id)
    }

    fn start_artifact(&mut self, notebook_id: &str) -> RemoteResult<Option<String>> {
        if !self.notebook_exists(notebook_id) {
            return Err(RemoteError::Rejected(format!("no notebook {notebook_id}")));
        }
        let id = self.next("art");
        self.artifacts
            .entry(notebook_id.to_owned())
            .or_default()
            .push(ArtifactStatus {
                id: id.clone(),
                status: "in_progress".to_owned(),
            });
        Ok((!self.omit_artifact_ids).then_some(id))
    }
}

/// Fake remote holding notebooks, sources and artifacts in memory.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing notebook.
    pub fn with_notebook(self, id: &str, title: &str) -> Self {
        {
            let mut inner = self.lock();
            inner.notebooks.push(NotebookInfo {
                id: id.to_owned(),
                title: title.to_owned(),
            });
            inner.sources.entry(id.to_owned()).or_default();
        }
        self
    }

    /// Seed a source without logging a call; returns its id.
    pub fn seed_source(&self, notebook_id: &str, title: &str, content: &str) -> String {
        let mut inner = self.lock();
        let id = inner.next("src");
        inner
            .sources
            .entry(notebook_id.to_owned())
            .or_default()
            .push(RemoteSource {
                id: id.clone(),
                title: title.to_owned(),
                source_type: "text".to_owned(),
            });
        inner.contents.insert(id.clone(), content.to_owned());
        id
    }

    /// Reject uploads whose title contains `fragment`.
    pub fn fail_add_matching(&self, fragment: &str) {
        self.lock().fail_add.push(fragment.to_owned());
    }

    pub fn fail_delete_of(&self, source_id: &str) {
        self.lock().fail_delete.insert(source_id.to_owned());
    }

    /// Drop every injected add/delete/poll failure.
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.fail_add.clear();
        inner.fail_delete.clear();
        inner.fail_polls = 0;
    }

    /// The next `n` polls return a transport error.
    pub fn fail_next_polls(&self, n: usize) {
        self.lock().fail_polls = n;
    }

    /// Artifacts report complete from the `n`th successful poll on.
    pub fn complete_after_polls(&self, n: usize) {
        self.lock().polls_until_complete = n;
    }

    pub fn never_complete(&self) {
        self.lock().polls_until_complete = usize::MAX;
    }

    /// Creation calls succeed but report no artifact id.
    pub fn omit_artifact_ids(&self) {
        self.lock().omit_artifact_ids = true;
    }

    /// Mind map calls fail as unsupported, like a server without that tool.
    pub fn without_mind_maps(&self) {
        self.lock().no_mind_maps = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn notebooks(&self) -> Vec<NotebookInfo> {
        self.lock().notebooks.clone()
    }

    pub fn sources(&self, notebook_id: &str) -> Vec<RemoteSource> {
        self.lock()
            .sources
            .get(notebook_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn content_of(&self, source_id: &str) -> Option<String> {
        self.lock().contents.get(source_id).cloned()
    }

    pub fn artifacts(&self, notebook_id: &str) -> Vec<ArtifactStatus> {
        self.lock()
            .artifacts
            .get(notebook_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl RemoteStore for MemoryRemote {
    fn list_notebooks(&self) -> RemoteResult<Vec<NotebookInfo>> {
        let mut inner = self.lock();
        inner.calls.push(Call::ListNotebooks);
        Ok(inner.notebooks.clone())
    }

    fn get_notebook(&self, notebook_id: &str) -> RemoteResult<Option<NotebookInfo>> {
        let mut inner = self.lock();
        inner.calls.push(Call::GetNotebook(notebook_id.to_owned()));
        Ok(inner.notebooks.iter().find(|n| n.id == notebook_id).cloned())
    }

    fn create_notebook(&self, title: &str) -> RemoteResult<NotebookInfo> {
        let mut inner = self.lock();
        inner.calls.push(Call::CreateNotebook(title.to_owned()));
        let notebook = NotebookInfo {
            id: inner.next("nb"),
            title: title.to_owned(),
        };
        inner.notebooks.push(notebook.clone());
        inner.sources.entry(notebook.id.clone()).or_default();
        Ok(notebook)
    }

    fn list_sources(&self, notebook_id: &str) -> RemoteResult<Vec<RemoteSource>> {
        let mut inner = self.lock();
        inner.calls.push(Call::ListSources(notebook_id.to_owned()));
        inner
            .sources
            .get(notebook_id)
            .cloned()
            .ok_or_else(|| RemoteError::Rejected(format!("no notebook {notebook_id}")))
    }

    fn add_text_source(&self, notebook_id: &str, title: &str, content: &str) -> RemoteResult<String> {
        let mut inner = self.lock();
        inner.calls.push(Call::AddSource(title.to_owned()));
        if inner.fail_add.iter().any(|f| title.contains(f.as_str())) {
            return Err(RemoteError::Rejected(format!("upload refused: {title}")));
        }
        if !inner.notebook_exists(notebook_id) {
            return Err(RemoteError::Rejected(format!("no notebook {notebook_id}")));
        }
        let id = inner.next("src");
        inner
            .sources
            .entry(notebook_id.to_owned())
            .or_default()
            .push(RemoteSource {
                id: id.clone(),
                title: title.to_owned(),
                source_type: "text".to_owned(),
            });
        inner.contents.insert(id.clone(), content.to_owned());
        Ok(id)
    }

    fn delete_source(&self, source_id: &str) -> RemoteResult<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::DeleteSource(source_id.to_owned()));
        if inner.fail_delete.contains(source_id) {
            return Err(RemoteError::Transport(format!("delete of {source_id} timed out")));
        }
        let mut found = false;
        for sources in inner.sources.values_mut() {
            let before = sources.len();
            sources.retain(|s| s.id != source_id);
            found |= sources.len() != before;
        }
        if !found {
            return Err(RemoteError::Rejected(format!("no source {source_id}")));
        }
        inner.contents.remove(source_id);
        Ok(())
    }

    fn generate_mind_map(&self, notebook_id: &str, source_ids: &[String]) -> RemoteResult<String> {
        let mut inner = self.lock();
        inner.calls.push(Call::GenerateMindMap);
        if inner.no_mind_maps {
            return Err(RemoteError::Unsupported("mind map generation"));
        }
        if !inner.notebook_exists(notebook_id) {
            return Err(RemoteError::Rejected(format!("no notebook {notebook_id}")));
        }
        Ok(format!("{{\"nodes\":{}}}", source_ids.len()))
    }

    fn save_mind_map(
        &self,
        notebook_id: &str,
        title: &str,
        _mind_map: &str,
        _source_ids: &[String],
    ) -> RemoteResult<Option<String>> {
        let mut inner = self.lock();
        inner.calls.push(Call::SaveMindMap(title.to_owned()));
        inner.start_artifact(notebook_id)
    }

    fn create_artifact(
        &self,
        notebook_id: &str,
        _source_ids: &[String],
        request: &StudioRequest,
    ) -> RemoteResult<Option<String>> {
        let mut inner = self.lock();
        inner.calls.push(Call::CreateArtifact(*request));
        inner.start_artifact(notebook_id)
    }

    fn poll_artifacts(&self, notebook_id: &str) -> RemoteResult<Vec<ArtifactStatus>> {
        let mut inner = self.lock();
        inner.calls.push(Call::Poll);
        if inner.fail_polls > 0 {
            inner.fail_polls -= 1;
            return Err(RemoteError::Transport("status endpoint unavailable".to_owned()));
        }
        inner.polls += 1;
        let done = inner.polls >= inner.polls_until_complete;
        let artifacts = inner.artifacts.entry(notebook_id.to_owned()).or_default();
        if done {
            for a in artifacts.iter_mut() {
                a.status = "completed".to_owned();
            }
        }
        Ok(artifacts.clone())
    }
}
