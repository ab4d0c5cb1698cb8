//! Errors surfaced by explicit pattern persistence calls

use std::path::PathBuf;
use thiserror::Error;

/// Failures from loading or saving the pattern file.
///
/// Matching and learning never produce these; they degrade to "no pattern"
/// instead. Only callers that ask for persistence directly see them.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
}

impl PatternError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json { path: path.into(), source }
    }
}
