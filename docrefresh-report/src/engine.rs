//! Tera rendering engine: [`ReportKind`], [`TemplateEngine`] and [`Reporter`].
//!
//! Templates are embedded at compile time. A directory of user templates
//! (normally `~/.docrefresh/templates/`) can override any of them by file name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::Tera;

use docrefresh_core::RepositoryInventory;
use docrefresh_discover::ValidationReport;
use docrefresh_sync::artifact_apply::ArtifactOutcome;
use docrefresh_sync::pipeline::{RunMode, RunReport};
use docrefresh_sync::{ArtifactPlan, ChangeComparison, SyncOutcome, SyncPlan};

use crate::context::{
    to_tera_context, ArtifactPlanCtx, ArtifactResultCtx, DiscoveryCtx, SyncPlanCtx,
    SyncResultCtx, ValidationCtx,
};
use crate::error::ReportError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("discovery.md.tera", include_str!("templates/discovery.md.tera")),
    ("validation.md.tera", include_str!("templates/validation.md.tera")),
    ("sync_plan.md.tera", include_str!("templates/sync_plan.md.tera")),
    ("sync_result.md.tera", include_str!("templates/sync_result.md.tera")),
    ("artifact_plan.md.tera", include_str!("templates/artifact_plan.md.tera")),
    (
        "artifact_result.md.tera",
        include_str!("templates/artifact_result.md.tera"),
    ),
];

/// `<home>/.docrefresh/templates`
pub fn user_template_dir_at(home: &Path) -> PathBuf {
    home.join(".docrefresh").join("templates")
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ReportError {
    ReportError::Io { path: path.into(), source }
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, ReportError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name.to_lowercase(), contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, ReportError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| ((*name).to_owned(), (*content).to_owned()))
        .collect();
    if let Some(dir) = user_template_dir {
        templates.extend(load_user_templates(dir)?);
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// ReportKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Discovery,
    Validation,
    SyncPlan,
    SyncResult,
    ArtifactPlan,
    ArtifactResult,
}

impl ReportKind {
    pub fn all() -> &'static [ReportKind] {
        &[
            ReportKind::Discovery,
            ReportKind::Validation,
            ReportKind::SyncPlan,
            ReportKind::SyncResult,
            ReportKind::ArtifactPlan,
            ReportKind::ArtifactResult,
        ]
    }

    pub fn template_name(self) -> &'static str {
        match self {
            ReportKind::Discovery      => "discovery.md.tera",
            ReportKind::Validation     => "validation.md.tera",
            ReportKind::SyncPlan       => "sync_plan.md.tera",
            ReportKind::SyncResult     => "sync_result.md.tera",
            ReportKind::ArtifactPlan   => "artifact_plan.md.tera",
            ReportKind::ArtifactResult => "artifact_result.md.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Embedded templates plus optional user overrides.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, ReportError> {
        Ok(TemplateEngine {
            tera: build_tera(user_template_dir)?,
        })
    }

    pub fn render(&self, kind: ReportKind, ctx: &impl Serialize) -> Result<String, ReportError> {
        let ctx = to_tera_context(ctx)?;
        Ok(self.tera.render(kind.template_name(), &ctx)?)
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Renders pipeline results as markdown-flavoured text.
pub struct Reporter {
    engine: TemplateEngine,
}

impl Reporter {
    /// Embedded templates only.
    pub fn new() -> Result<Self, ReportError> {
        Self::with_overrides(None)
    }

    pub fn with_overrides(user_template_dir: Option<&Path>) -> Result<Self, ReportError> {
        Ok(Reporter {
            engine: TemplateEngine::new(user_template_dir)?,
        })
    }

    pub fn discovery(&self, inv: &RepositoryInventory) -> Result<String, ReportError> {
        self.engine
            .render(ReportKind::Discovery, &DiscoveryCtx::from_inventory(inv))
    }

    pub fn validation(
        &self,
        inv: &RepositoryInventory,
        report: &ValidationReport,
        comparison: Option<&ChangeComparison>,
    ) -> Result<String, ReportError> {
        self.engine.render(
            ReportKind::Validation,
            &ValidationCtx::new(inv, report, comparison),
        )
    }

    pub fn sync_plan(&self, plan: &SyncPlan, applied: bool) -> Result<String, ReportError> {
        self.engine
            .render(ReportKind::SyncPlan, &SyncPlanCtx::new(plan, applied))
    }

    pub fn sync_result(&self, outcome: &SyncOutcome) -> Result<String, ReportError> {
        self.engine
            .render(ReportKind::SyncResult, &SyncResultCtx::from(outcome))
    }

    pub fn artifact_plan(&self, plan: &ArtifactPlan) -> Result<String, ReportError> {
        self.engine
            .render(ReportKind::ArtifactPlan, &ArtifactPlanCtx::from(plan))
    }

    pub fn artifact_result(&self, outcome: &ArtifactOutcome) -> Result<String, ReportError> {
        self.engine
            .render(ReportKind::ArtifactResult, &ArtifactResultCtx::from(outcome))
    }

    /// Every section a run produced, in pipeline order.
    pub fn run_report(&self, report: &RunReport) -> Result<String, ReportError> {
        if report.mode == RunMode::DiscoveryOnly {
            return self.discovery(&report.inventory);
        }

        let mut sections = Vec::new();
        if let Some(validation) = &report.validation {
            sections.push(self.validation(
                &report.inventory,
                validation,
                report.comparison.as_ref(),
            )?);
        }
        if let Some(plan) = &report.sync_plan {
            sections.push(self.sync_plan(plan, report.applied)?);
        }
        if let Some(outcome) = &report.sync_outcome {
            sections.push(self.sync_result(outcome)?);
        }
        if let Some(plan) = &report.artifact_plan {
            sections.push(self.artifact_plan(plan)?);
        }
        if let Some(outcome) = &report.artifact_outcome {
            sections.push(self.artifact_result(outcome)?);
        }
        Ok(sections.join("\n"))
    }
}
