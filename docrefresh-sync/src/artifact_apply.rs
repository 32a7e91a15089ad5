//! Artifact creation and bounded completion polling.

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use docrefresh_core::{ArtifactState, RepoState};
use serde::Serialize;

use crate::artifact::ArtifactType;
use crate::artifact_plan::ArtifactPlan;
use crate::remote::{ArtifactStatus, RemoteError, RemoteResult, RemoteStore};

const MIND_MAP_TITLE: &str = "Documentation Mind Map";

/// Completion polling bounds. A zero timeout skips polling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedArtifact {
    pub artifact: ArtifactType,
    pub artifact_id: Option<String>,
    /// `initiated` until a poll confirms completion.
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ArtifactOutcome {
    pub created: Vec<CreatedArtifact>,
    pub failed: usize,
    pub errors: Vec<String>,
    /// Types the remote cannot produce; skipped without failing the run.
    pub warnings: Vec<String>,
    /// A poll confirmed every created artifact.
    pub completed: bool,
}

impl ArtifactOutcome {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record every created artifact, confirmed or not.
    pub fn merge_into(&self, state: &mut RepoState, created_at: DateTime<Utc>) {
        for c in &self.created {
            state.record_artifact(
                c.artifact.key(),
                ArtifactState {
                    artifact_id: c.artifact_id.clone(),
                    status: c.status.clone(),
                    created_at,
                },
            );
        }
    }
}

/// Create every artifact in `plan` and wait for them within `poll`.
pub fn apply_artifact_plan(
    remote: &dyn RemoteStore,
    plan: &ArtifactPlan,
    poll: PollConfig,
) -> ArtifactOutcome {
    let mut outcome = ArtifactOutcome::default();
    if !plan.has_work() {
        return outcome;
    }
    let Some(notebook_id) = plan.notebook_id.as_deref() else {
        outcome.errors.push("No notebook ID available".to_owned());
        return outcome;
    };

    let source_ids: Vec<String> = match remote.list_sources(notebook_id) {
        Ok(sources) => sources
            .into_iter()
            .map(|s| s.id)
            .filter(|id| !id.is_empty())
            .collect(),
        Err(e) => {
            outcome
                .errors
                .push(format!("Failed to list notebook sources: {e}"));
            return outcome;
        }
    };
    if source_ids.is_empty() {
        outcome.errors.push("No sources found in notebook".to_owned());
        return outcome;
    }
    tracing::info!(
        "{}: creating {} artifact(s) from {} source(s)",
        plan.repo_key,
        plan.creates().count(),
        source_ids.len()
    );

    for action in plan.creates() {
        let artifact = action.artifact;
        match create_one(remote, notebook_id, &source_ids, artifact) {
            Ok(artifact_id) => {
                tracing::info!("{}: started {}", plan.repo_key, artifact.display_name());
                outcome.created.push(CreatedArtifact {
                    artifact,
                    artifact_id,
                    status: "initiated".to_owned(),
                });
            }
            Err(RemoteError::Unsupported(what)) => {
                tracing::warn!(
                    "{}: skipping {}: remote does not support {what}",
                    plan.repo_key,
                    artifact.display_name()
                );
                outcome.warnings.push(format!(
                    "Skipped {}: remote does not support {what}",
                    artifact.display_name()
                ));
            }
            Err(e) => {
                tracing::warn!("{}: {} failed: {e}", plan.repo_key, artifact.display_name());
                outcome.failed += 1;
                outcome
                    .errors
                    .push(format!("Failed to create {}: {e}", artifact.display_name()));
            }
        }
    }

    if !outcome.created.is_empty() && !poll.timeout.is_zero() {
        wait_for_completion(remote, notebook_id, poll, &mut outcome);
    }
    outcome
}

fn create_one(
    remote: &dyn RemoteStore,
    notebook_id: &str,
    source_ids: &[String],
    artifact: ArtifactType,
) -> RemoteResult<Option<String>> {
    match artifact.studio_request() {
        Some(request) => remote.create_artifact(notebook_id, source_ids, &request),
        None => {
            let mind_map = remote.generate_mind_map(notebook_id, source_ids)?;
            remote.save_mind_map(notebook_id, MIND_MAP_TITLE, &mind_map, source_ids)
        }
    }
}

fn wait_for_completion(
    remote: &dyn RemoteStore,
    notebook_id: &str,
    poll: PollConfig,
    outcome: &mut ArtifactOutcome,
) {
    let deadline = Instant::now() + poll.timeout;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match remote.poll_artifacts(notebook_id) {
            Ok(statuses) => {
                if all_complete(&statuses, &mut outcome.created) {
                    tracing::info!("all artifacts complete after {attempt} poll(s)");
                    outcome.completed = true;
                    return;
                }
                tracing::debug!("poll {attempt}: artifacts still pending");
            }
            Err(e) => tracing::warn!("status poll {attempt} failed: {e}"),
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        // The last sleep is cut short so one poll lands on the deadline.
        thread::sleep(poll.interval.min(deadline - now));
    }
    outcome.errors.push(format!(
        "Timeout waiting for artifacts after {}",
        format_timeout(poll.timeout)
    ));
}

/// `300s` for whole seconds, `250ms` otherwise.
fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}

/// Id-matched when every creation reported an id, otherwise count-based.
/// Confirmed artifacts have their status updated in place.
fn all_complete(statuses: &[ArtifactStatus], created: &mut [CreatedArtifact]) -> bool {
    let complete: Vec<&ArtifactStatus> = statuses.iter().filter(|s| s.is_complete()).collect();

    if created.iter().all(|c| c.artifact_id.is_some()) {
        let done: HashSet<&str> = complete.iter().map(|s| s.id.as_str()).collect();
        let mut all = true;
        for c in created.iter_mut() {
            match c.artifact_id.as_deref() {
                Some(id) if done.contains(id) => {
                    if let Some(s) = complete.iter().find(|s| s.id == id) {
                        c.status = s.status.clone();
                    }
                }
                _ => all = false,
            }
        }
        return all;
    }

    if complete.len() >= created.len() {
        for c in created.iter_mut() {
            c.status = "completed".to_owned();
        }
        return true;
    }
    false
}
