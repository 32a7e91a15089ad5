//! Error types for docrefresh-core.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-level failures: manifest and stored-state loading/saving.
///
/// Every variant is fatal for a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, tagged with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested manifest file did not exist.
    #[error("manifest not found at {path}")]
    ManifestNotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`, so there is no `~/.docrefresh/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
