//! Repository discovery and structural validation.
//!
//! [`discover_repo`] walks a repository against the manifest and produces a
//! [`RepositoryInventory`](docrefresh_core::RepositoryInventory). Checks run in
//! tier order: tier 1 and tier 2 against the repository root, tier 3 against
//! the resolved deep-reference root. [`validate`] inspects the documents that
//! exist.

pub mod discover;
pub mod error;
pub mod validate;

pub use discover::discover_repo;
pub use error::DiscoverError;
pub use validate::{
    extract_version, is_major_version_bump, read_meta_version, validate_document,
    validate_inventory, Rule, Severity, ValidationIssue, ValidationReport,
};
