//! The remote knowledge-base capability the sync engine depends on.
//!
//! [`RemoteStore`] covers notebook lookup/creation, source
//! listing/upload/removal, artifact creation, and status polling. The CLI
//! provides an MCP-over-HTTP implementation; [`memory::MemoryRemote`] is an
//! in-process fake for tests.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::StudioRequest;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network or protocol failure; the call may not have reached the remote.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote processed the call and refused it.
    #[error("remote rejected request: {0}")]
    Rejected(String),

    #[error("operation not supported by this remote: {0}")]
    Unsupported(&'static str),

    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// A source record as the remote reports it. The remote owns `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub source_type: String,
}

/// One entry of a studio status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub id: String,
    pub status: String,
}

impl ArtifactStatus {
    pub fn is_complete(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "ready" | "completed" | "complete"
        )
    }
}

/// Remote knowledge-base operations, one method per capability.
///
/// Methods take `&self`; implementations needing mutation use interior
/// mutability. Every call is independent: callers fold failures into their
/// own outcome lists.
pub trait RemoteStore {
    fn list_notebooks(&self) -> RemoteResult<Vec<NotebookInfo>>;

    /// `Ok(None)` when the id is unknown to the remote.
    fn get_notebook(&self, notebook_id: &str) -> RemoteResult<Option<NotebookInfo>>;

    fn create_notebook(&self, title: &str) -> RemoteResult<NotebookInfo>;

    fn list_sources(&self, notebook_id: &str) -> RemoteResult<Vec<RemoteSource>>;

    /// Upload text content; returns the new source id.
    fn add_text_source(&self, notebook_id: &str, title: &str, content: &str) -> RemoteResult<String>;

    fn delete_source(&self, source_id: &str) -> RemoteResult<()>;

    /// First step of a mind map: returns the generated map payload.
    fn generate_mind_map(&self, notebook_id: &str, source_ids: &[String]) -> RemoteResult<String>;

    /// Second step of a mind map: persists it and returns the artifact id.
    fn save_mind_map(
        &self,
        notebook_id: &str,
        title: &str,
        mind_map: &str,
        source_ids: &[String],
    ) -> RemoteResult<Option<String>>;

    /// Start a single-call artifact; returns its id when the remote reports one.
    fn create_artifact(
        &self,
        notebook_id: &str,
        source_ids: &[String],
        request: &StudioRequest,
    ) -> RemoteResult<Option<String>>;

    fn poll_artifacts(&self, notebook_id: &str) -> RemoteResult<Vec<ArtifactStatus>>;
}
