//! # docrefresh-sync
//!
//! Change detection and idempotent synchronisation against a remote notebook.
//!
//! Stages, in order: [`change::hash_inventory`] → [`change::compare`] →
//! [`plan::compute_sync_plan`] → [`apply::apply_sync_plan`] →
//! [`artifact_plan::compute_artifact_plan`] → [`artifact_apply::apply_artifact_plan`].
//! [`pipeline::run`] wires them together for one repository.

pub mod apply;
pub mod artifact;
pub mod artifact_apply;
pub mod artifact_plan;
pub mod change;
pub mod error;
pub mod fingerprint;
pub mod notebook;
pub mod pipeline;
pub mod plan;
pub mod remote;

pub use apply::{apply_sync_plan, SyncOutcome};
pub use artifact::{parse_artifact_list, ArtifactType, STANDARD_ARTIFACTS};
pub use artifact_apply::{apply_artifact_plan, ArtifactOutcome, PollConfig};
pub use artifact_plan::{compute_artifact_plan, ArtifactPlan, RegenerationFlags, Trigger};
pub use change::{compare, hash_inventory, ChangeComparison};
pub use error::SyncError;
pub use fingerprint::{content_fingerprint, file_fingerprint, FINGERPRINT_LEN};
pub use pipeline::{run, RunMode, RunOptions, RunReport};
pub use plan::{compute_sync_plan, SyncAction, SyncActionKind, SyncPlan};
pub use remote::{RemoteError, RemoteStore};
