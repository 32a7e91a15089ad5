//! Artifact regeneration planning.
//!
//! Regeneration happens only when a trigger fires: `--force`, a major
//! version bump, or a change ratio strictly above the threshold. The first
//! matching trigger wins.

use docrefresh_core::RepoKey;
use serde::Serialize;

use crate::artifact::{ArtifactType, STANDARD_ARTIFACTS};
use crate::change::ChangeComparison;

pub const DEFAULT_THRESHOLD: f64 = 0.15;

/// Caller-supplied trigger inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegenerationFlags {
    pub force: bool,
    pub major_version_bump: bool,
    pub threshold: f64,
}

impl Default for RegenerationFlags {
    fn default() -> Self {
        Self {
            force: false,
            major_version_bump: false,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Why regeneration fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Force,
    MajorVersion,
    Delta { ratio: f64, threshold: f64 },
}

impl Trigger {
    /// First match wins: force, then major version, then delta.
    pub fn evaluate(ratio: f64, flags: &RegenerationFlags) -> Option<Trigger> {
        if flags.force {
            Some(Trigger::Force)
        } else if flags.major_version_bump {
            Some(Trigger::MajorVersion)
        } else if ratio > flags.threshold {
            Some(Trigger::Delta {
                ratio,
                threshold: flags.threshold,
            })
        } else {
            None
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Trigger::Force => "--force flag".to_owned(),
            Trigger::MajorVersion => "Major version bump".to_owned(),
            Trigger::Delta { ratio, threshold } => format!(
                "Content delta {} > {} threshold",
                percent(*ratio, 1),
                percent(*threshold, 0)
            ),
        }
    }
}

/// `0.2` with one decimal is `20.0%`.
pub fn percent(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactActionKind {
    Create,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactAction {
    pub artifact: ArtifactType,
    pub kind: ArtifactActionKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactPlan {
    pub repo_key: RepoKey,
    pub notebook_id: Option<String>,
    pub trigger: Option<Trigger>,
    pub change_delta: f64,
    pub threshold: f64,
    pub actions: Vec<ArtifactAction>,
}

impl ArtifactPlan {
    pub fn triggered(&self) -> bool {
        self.trigger.is_some()
    }

    pub fn trigger_reason(&self) -> Option<String> {
        self.trigger.as_ref().map(Trigger::reason)
    }

    pub fn creates(&self) -> impl Iterator<Item = &ArtifactAction> {
        self.actions
            .iter()
            .filter(|a| a.kind == ArtifactActionKind::Create)
    }

    pub fn skips(&self) -> impl Iterator<Item = &ArtifactAction> {
        self.actions
            .iter()
            .filter(|a| a.kind == ArtifactActionKind::Skip)
    }

    pub fn has_work(&self) -> bool {
        self.creates().next().is_some()
    }
}

/// Plan regeneration for `artifacts` (empty means the standard set).
pub fn compute_artifact_plan(
    repo_key: &RepoKey,
    notebook_id: Option<&str>,
    comparison: &ChangeComparison,
    flags: RegenerationFlags,
    artifacts: &[ArtifactType],
) -> ArtifactPlan {
    let delta = comparison.change_ratio();
    let trigger = Trigger::evaluate(delta, &flags);
    let selected: &[ArtifactType] = if artifacts.is_empty() {
        &STANDARD_ARTIFACTS
    } else {
        artifacts
    };

    let (kind, reason) = match &trigger {
        Some(t) => (ArtifactActionKind::Create, t.reason()),
        None => (
            ArtifactActionKind::Skip,
            format!(
                "Change delta {} below {} threshold",
                percent(delta, 1),
                percent(flags.threshold, 0)
            ),
        ),
    };
    let actions = selected
        .iter()
        .map(|&artifact| ArtifactAction {
            artifact,
            kind,
            reason: reason.clone(),
        })
        .collect();

    match &trigger {
        Some(t) => tracing::info!("{repo_key}: artifact regeneration triggered ({})", t.reason()),
        None => tracing::debug!("{repo_key}: artifact regeneration not triggered ({reason})"),
    }

    ArtifactPlan {
        repo_key: repo_key.clone(),
        notebook_id: notebook_id.map(str::to_owned),
        trigger,
        change_delta: delta,
        threshold: flags.threshold,
        actions,
    }
}
