//! docrefresh core library: domain types, manifest resolution, stored state, errors.
//!
//! - [`types`]: document descriptors, inventories, tiers, fingerprints
//! - [`manifest`]: canonical document manifest + tier-3 root resolution
//! - [`state`]: per-repository ledger persisted under `~/.docrefresh/state/`
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod manifest;
pub mod state;
pub mod types;

pub use error::ConfigError;
pub use manifest::{DocumentDef, Manifest, RepoOverride, TierSection, Tiers};
pub use state::{ArtifactState, DocState, RepoState};
pub use types::{
    ChangeState, DocKind, DocTier, DocumentDescriptor, Fingerprint, RepoKey, RepoTier,
    RepositoryInventory,
};
