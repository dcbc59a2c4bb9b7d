use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during embedding store operations.
///
/// Dimension mismatches are not represented here: they surface as an
/// infinite distance and therefore as "no match".
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        /// The backing file (or its temporary sibling).
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The backing file does not match the expected schema.
    #[error("malformed store file '{}': {source}", path.display())]
    Malformed {
        /// The backing file.
        path: PathBuf,
        /// The parse error.
        source: serde_json::Error,
    },

    /// The in-memory record set could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// `add` was called without an embedding.
    #[error("embedding is empty")]
    EmptyEmbedding,

    /// `add` was called with a NaN or infinite component, which the JSON
    /// store file cannot represent.
    #[error("embedding component {index} is not finite")]
    NonFiniteEmbedding {
        /// Position of the first offending component.
        index: usize,
    },

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
