//! Template contexts: flat, serializable views of pipeline results.
//!
//! Every context is pre-formatted (percentages, locations, optional ids) so
//! templates never branch on missing values beyond truthiness.

use chrono::{DateTime, Utc};
use serde::Serialize;

use docrefresh_core::{DocTier, RepoTier, RepositoryInventory};
use docrefresh_discover::{Severity, ValidationIssue, ValidationReport};
use docrefresh_sync::artifact_apply::ArtifactOutcome;
use docrefresh_sync::artifact_plan::{percent, ArtifactPlan};
use docrefresh_sync::notebook::notebook_title;
use docrefresh_sync::pipeline::RunReport;
use docrefresh_sync::{ChangeComparison, SyncActionKind, SyncOutcome, SyncPlan};

use crate::error::ReportError;

const NONE: &str = "-";

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryCtx {
    pub repo_key: String,
    pub repo_path: String,
    pub tier: String,
    pub tier3_root: Option<String>,
    pub tiers: Vec<TierGroupCtx>,
    pub found: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierGroupCtx {
    pub number: u8,
    pub label: &'static str,
    pub docs: Vec<DocCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocCtx {
    pub path: String,
    pub exists: bool,
}

impl DiscoveryCtx {
    /// Tier 2 shows when it has entries; tier 3 only for KITTED repositories.
    pub fn from_inventory(inv: &RepositoryInventory) -> Self {
        let tier = inv.tier();
        let tiers = DocTier::ALL
            .iter()
            .filter(|t| **t != DocTier::DeepReference || tier == RepoTier::Kitted)
            .map(|&t| TierGroupCtx {
                number: t.number(),
                label: t.label(),
                docs: inv
                    .docs_in(t)
                    .map(|d| DocCtx {
                        path: d.key(),
                        exists: d.exists,
                    })
                    .collect(),
            })
            .filter(|g| g.number == 1 || !g.docs.is_empty())
            .collect();

        DiscoveryCtx {
            repo_key: inv.repo_key.to_string(),
            repo_path: inv.repo_path.display().to_string(),
            tier: tier.to_string(),
            tier3_root: inv.tier3_root_relative(),
            tiers,
            found: inv.existing().count(),
            total: inv.docs.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ValidationCtx {
    pub repo_key: String,
    pub tier: String,
    pub found: usize,
    pub total: usize,
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub sections: Vec<IssueSectionCtx>,
    pub change: Option<ChangeCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueSectionCtx {
    pub title: &'static str,
    pub issues: Vec<IssueCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueCtx {
    pub letter: char,
    /// `path` or `path:line`.
    pub location: String,
    pub message: String,
    pub context: Option<String>,
}

impl From<&ValidationIssue> for IssueCtx {
    fn from(issue: &ValidationIssue) -> Self {
        let path = issue.doc_path.display();
        let location = match issue.line {
            Some(line) => format!("{path}:{line}"),
            None => path.to_string(),
        };
        IssueCtx {
            letter: issue.severity.letter(),
            location,
            message: issue.message.clone(),
            context: issue.context.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeCtx {
    pub total: usize,
    pub changed_count: usize,
    pub unchanged_count: usize,
    pub new_count: usize,
    pub delta: String,
    pub changed: Vec<ChangedDocCtx>,
    pub new_docs: Vec<ChangedDocCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangedDocCtx {
    pub path: String,
    pub old: String,
    pub new: String,
}

impl ChangeCtx {
    pub fn from_comparison(cmp: &ChangeComparison) -> Self {
        let fp = |f: &Option<docrefresh_core::Fingerprint>| {
            f.as_ref().map_or_else(|| NONE.to_owned(), |f| f.to_string())
        };
        let row = |d: &docrefresh_core::DocumentDescriptor| ChangedDocCtx {
            path: d.key(),
            old: fp(&d.stored_fingerprint),
            new: fp(&d.fingerprint),
        };
        ChangeCtx {
            total: cmp.total(),
            changed_count: cmp.changed.len(),
            unchanged_count: cmp.unchanged.len(),
            new_count: cmp.new_docs.len(),
            delta: percent(cmp.change_ratio(), 1),
            changed: cmp.changed.iter().map(row).collect(),
            new_docs: cmp.new_docs.iter().map(row).collect(),
        }
    }
}

impl ValidationCtx {
    pub fn new(
        inv: &RepositoryInventory,
        report: &ValidationReport,
        comparison: Option<&ChangeComparison>,
    ) -> Self {
        let sections = [
            (Severity::Error, "Errors (must fix)"),
            (Severity::Warning, "Warnings (should fix)"),
            (Severity::Info, "Info"),
        ]
        .into_iter()
        .map(|(severity, title)| IssueSectionCtx {
            title,
            issues: report.with_severity(severity).map(IssueCtx::from).collect(),
        })
        .filter(|s| !s.issues.is_empty())
        .collect();

        ValidationCtx {
            repo_key: inv.repo_key.to_string(),
            tier: inv.tier().to_string(),
            found: inv.existing().count(),
            total: inv.docs.len(),
            valid: report.is_valid(),
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            sections,
            change: comparison.map(ChangeCtx::from_comparison),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SyncPlanCtx {
    pub repo_key: String,
    pub notebook_id: String,
    pub notebook_title: String,
    pub needs_create: bool,
    pub applied: bool,
    pub total: usize,
    pub groups: Vec<ActionGroupCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionGroupCtx {
    pub title: String,
    pub actions: Vec<ActionCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionCtx {
    pub path: String,
    pub reason: String,
}

impl SyncPlanCtx {
    pub fn new(plan: &SyncPlan, applied: bool) -> Self {
        let groups = [
            (SyncActionKind::Add, "docs"),
            (SyncActionKind::Update, "docs"),
            (SyncActionKind::Delete, "sources"),
        ]
        .into_iter()
        .filter_map(|(kind, noun)| {
            let actions: Vec<ActionCtx> = plan
                .of_kind(kind)
                .map(|a| ActionCtx {
                    path: a.path.clone(),
                    reason: a.reason.clone(),
                })
                .collect();
            if actions.is_empty() {
                return None;
            }
            let verb = match kind {
                SyncActionKind::Add => "Add",
                SyncActionKind::Update => "Update",
                SyncActionKind::Delete => "Delete",
            };
            Some(ActionGroupCtx {
                title: format!("{verb} ({} {noun})", actions.len()),
                actions,
            })
        })
        .collect();

        SyncPlanCtx {
            repo_key: plan.repo_key.to_string(),
            notebook_id: plan.notebook_id.clone().unwrap_or_else(|| NONE.to_owned()),
            notebook_title: notebook_title(&plan.repo_key),
            needs_create: plan.needs_create(),
            applied,
            total: plan.actions.len(),
            groups,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResultCtx {
    pub success: bool,
    pub notebook_id: String,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl From<&SyncOutcome> for SyncResultCtx {
    fn from(o: &SyncOutcome) -> Self {
        SyncResultCtx {
            success: o.success(),
            notebook_id: o.notebook_id.clone().unwrap_or_else(|| NONE.to_owned()),
            added: o.added,
            updated: o.updated,
            deleted: o.deleted,
            warnings: o.warnings.clone(),
            errors: o.errors.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPlanCtx {
    pub repo_key: String,
    pub notebook_id: String,
    pub delta: String,
    pub triggered: bool,
    pub reason: String,
    pub creates: Vec<&'static str>,
    pub skips: Vec<SkipCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipCtx {
    pub name: &'static str,
    pub reason: String,
}

impl From<&ArtifactPlan> for ArtifactPlanCtx {
    fn from(plan: &ArtifactPlan) -> Self {
        ArtifactPlanCtx {
            repo_key: plan.repo_key.to_string(),
            notebook_id: plan.notebook_id.clone().unwrap_or_else(|| NONE.to_owned()),
            delta: percent(plan.change_delta, 1),
            triggered: plan.triggered(),
            reason: plan.trigger_reason().unwrap_or_default(),
            creates: plan.creates().map(|a| a.artifact.display_name()).collect(),
            skips: plan
                .skips()
                .map(|a| SkipCtx {
                    name: a.artifact.display_name(),
                    reason: a.reason.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactResultCtx {
    pub success: bool,
    pub created_count: usize,
    pub failed: usize,
    pub created: Vec<CreatedCtx>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedCtx {
    pub name: &'static str,
    pub status: String,
}

impl From<&ArtifactOutcome> for ArtifactResultCtx {
    fn from(o: &ArtifactOutcome) -> Self {
        ArtifactResultCtx {
            success: o.success(),
            created_count: o.created.len(),
            failed: o.failed,
            created: o
                .created
                .iter()
                .map(|c| CreatedCtx {
                    name: c.artifact.display_name(),
                    status: c.status.clone(),
                })
                .collect(),
            errors: o.errors.clone(),
            warnings: o.warnings.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Compact line and JSON summary
// ---------------------------------------------------------------------------

/// `{repo}: {VALID|INVALID} [{tier}] {found}/{total} docs, {E}E/{W}W`
pub fn compact_line(report: &RunReport) -> String {
    let inv = &report.inventory;
    let (errors, warnings) = report
        .validation
        .as_ref()
        .map_or((0, 0), |v| (v.error_count(), v.warning_count()));
    format!(
        "{}: {} [{}] {}/{} docs, {}E/{}W",
        inv.repo_key,
        if report.is_valid() { "VALID" } else { "INVALID" },
        inv.tier(),
        inv.existing().count(),
        inv.docs.len(),
        errors,
        warnings
    )
}

/// Machine-readable summary emitted by `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub repo: String,
    pub tier: String,
    pub valid: bool,
    pub success: bool,
    pub applied: bool,
    pub docs_found: usize,
    pub docs_total: usize,
    pub errors: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier3_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_detection: Option<ChangeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub new: usize,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub notebook_id: Option<String>,
    pub planned_add: usize,
    pub planned_update: usize,
    pub planned_delete: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<usize>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub triggered: bool,
    pub reason: Option<String>,
    pub planned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<usize>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn from_report(report: &RunReport) -> Self {
        let inv = &report.inventory;
        let (errors, warnings) = report
            .validation
            .as_ref()
            .map_or((0, 0), |v| (v.error_count(), v.warning_count()));

        let sync = report.sync_plan.as_ref().map(|plan| {
            let outcome = report.sync_outcome.as_ref();
            SyncSummary {
                notebook_id: outcome
                    .and_then(|o| o.notebook_id.clone())
                    .or_else(|| plan.notebook_id.clone()),
                planned_add: plan.count(SyncActionKind::Add),
                planned_update: plan.count(SyncActionKind::Update),
                planned_delete: plan.count(SyncActionKind::Delete),
                added: outcome.map(|o| o.added),
                updated: outcome.map(|o| o.updated),
                deleted: outcome.map(|o| o.deleted),
                errors: outcome.map(|o| o.errors.clone()).unwrap_or_default(),
                warnings: outcome.map(|o| o.warnings.clone()).unwrap_or_default(),
            }
        });

        let artifacts = report.artifact_plan.as_ref().map(|plan| {
            let outcome = report.artifact_outcome.as_ref();
            ArtifactSummary {
                triggered: plan.triggered(),
                reason: plan.trigger_reason(),
                planned: plan.creates().count(),
                created: outcome.map(|o| o.created.len()),
                errors: outcome.map(|o| o.errors.clone()).unwrap_or_default(),
                warnings: outcome.map(|o| o.warnings.clone()).unwrap_or_default(),
            }
        });

        RunSummary {
            repo: inv.repo_key.to_string(),
            tier: inv.tier().to_string(),
            valid: report.is_valid(),
            success: report.success(),
            applied: report.applied,
            docs_found: inv.existing().count(),
            docs_total: inv.docs.len(),
            errors,
            warnings,
            tier3_root: inv.tier3_root_relative(),
            change_detection: report.comparison.as_ref().map(|c| ChangeSummary {
                changed: c.changed.len(),
                unchanged: c.unchanged.len(),
                new: c.new_docs.len(),
                delta: (c.change_ratio() * 1000.0).round() / 1000.0,
            }),
            sync,
            artifacts,
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `5m ago`, `3h ago`, `2d ago`; `never` for no timestamp.
pub fn format_age(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = ts else {
        return "never".to_owned();
    };
    let secs = (now - ts).num_seconds().max(0);
    match secs {
        s if s < 60 => "just now".to_owned(),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// Convert any context to a [`tera::Context`].
pub fn to_tera_context(ctx: &impl Serialize) -> Result<tera::Context, ReportError> {
    Ok(tera::Context::from_serialize(ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docrefresh_core::{DocKind, DocumentDescriptor, Fingerprint, RepoKey};
    use std::path::PathBuf;

    fn doc(path: &str, tier: DocTier, exists: bool) -> DocumentDescriptor {
        DocumentDescriptor {
            path: PathBuf::from(path),
            tier,
            purpose: String::new(),
            kind: DocKind::File,
            exists,
            required: tier == DocTier::Core,
            fingerprint: None,
            stored_fingerprint: None,
        }
    }

    #[test]
    fn discovery_hides_tier3_unless_kitted() {
        let inv = RepositoryInventory {
            repo_path: PathBuf::from("/code/demo"),
            repo_key: RepoKey::from("demo"),
            tier3_root: None,
            docs: vec![
                doc("README.md", DocTier::Core, true),
                doc("CLAUDE.md", DocTier::Extended, true),
                doc("OVERVIEW.md", DocTier::DeepReference, false),
            ],
        };
        let ctx = DiscoveryCtx::from_inventory(&inv);
        assert_eq!(ctx.tier, "complex");
        assert_eq!(ctx.tiers.len(), 2);
        assert_eq!((ctx.found, ctx.total), (2, 3));
    }

    #[test]
    fn change_ctx_formats_delta_and_fingerprints() {
        let mut changed = doc("README.md", DocTier::Core, true);
        changed.fingerprint = Some(Fingerprint::from("bbbbbbbbbbbb"));
        changed.stored_fingerprint = Some(Fingerprint::from("aaaaaaaaaaaa"));
        let unchanged = doc("CHANGELOG.md", DocTier::Core, true);
        let cmp = ChangeComparison {
            changed: vec![changed],
            unchanged: vec![unchanged.clone(), unchanged.clone(), unchanged],
            new_docs: Vec::new(),
        };
        let ctx = ChangeCtx::from_comparison(&cmp);
        assert_eq!(ctx.delta, "25.0%");
        assert_eq!(ctx.changed[0].old, "aaaaaaaaaaaa");
        assert_eq!(ctx.changed[0].new, "bbbbbbbbbbbb");
    }

    #[test]
    fn age_buckets() {
        let now = Utc::now();
        assert_eq!(format_age(None, now), "never");
        assert_eq!(format_age(Some(now - Duration::seconds(5)), now), "just now");
        assert_eq!(format_age(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(format_age(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(format_age(Some(now - Duration::days(2)), now), "2d ago");
    }
}
