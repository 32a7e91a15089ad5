//! # docrefresh-report
//!
//! Tera-based rendering of discovery, validation, sync and artifact reports,
//! plus the one-line compact form and the `--json` summary.
//!
//! ```rust,no_run
//! use docrefresh_report::Reporter;
//! use docrefresh_sync::pipeline::RunReport;
//!
//! fn print(report: &RunReport) {
//!     if let Ok(reporter) = Reporter::new() {
//!         if let Ok(text) = reporter.run_report(report) {
//!             println!("{text}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{compact_line, format_age, RunSummary};
pub use engine::{user_template_dir_at, ReportKind, Reporter, TemplateEngine};
pub use error::ReportError;
