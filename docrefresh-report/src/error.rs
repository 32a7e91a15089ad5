//! Error types for docrefresh-report.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("template engine error: {0}")]
    Template(#[from] tera::Error),

    /// Building the template context or the `--json` summary failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
