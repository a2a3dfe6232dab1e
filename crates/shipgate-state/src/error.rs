//! Error types for shipgate-state

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by run log and benchmark summary storage.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A sealed record with the same key is already in the log.
    #[error("run already recorded: {key}")]
    DuplicateRecord { key: String },

    #[error("no run recorded for {key}")]
    NotFound { key: String },

    /// A stored entry no longer matches the digest written with it.
    #[error("digest mismatch for {key}: stored {expected}, computed {actual}")]
    DigestMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("corrupt entry at {path}:{line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
