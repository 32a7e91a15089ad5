use std::path::PathBuf;

use thiserror::Error;

/// Errors from discovery. A missing individual document is not an error.
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("repository not found: {path}")]
    RepoNotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DiscoverError {
    DiscoverError::Io {
        path: path.into(),
        source,
    }
}
