//! Error taxonomy for pipeline construction and retrieval.
//!
//! Construction-time errors are fatal to the caller. Per-query failures are
//! absorbed by [`Pipeline::query`](crate::pipeline::Pipeline::query) and never
//! surface as a `RagError`. Generation failures have their own type,
//! [`GenerationError`](crate::generation::GenerationError).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Missing credential or invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Corpus directory missing, unreadable, or containing undecodable files.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// Persisted artifacts exist but disagree with each other or the corpus.
    #[error("index corruption: {0}")]
    IndexCorruption(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
