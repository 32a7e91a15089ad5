//! Error types for docrefresh-sync.
//!
//! Only run-level failures live here. Per-action remote failures are folded
//! into outcome error lists and never surface as `SyncError`.

use std::path::PathBuf;

use thiserror::Error;

use docrefresh_core::ConfigError;
use docrefresh_discover::DiscoverError;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Manifest or stored-state failure.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("discovery error: {0}")]
    Discover(#[from] DiscoverError),

    /// Remote failure while gathering the state a plan is computed from.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("--apply requires a remote endpoint")]
    NoRemote,
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
