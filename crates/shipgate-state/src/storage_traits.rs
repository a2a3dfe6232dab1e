//! Storage trait definitions for shipgate
//!
//! `RunLog` is the append-only history of sealed run records, keyed by task
//! id and seal timestamp. It is async and backend-agnostic; an in-memory fake
//! lives in the `fakes` module and a JSON-lines file backend in `file_log`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use shipgate_core::{RunRecord, TaskId};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Content digest (SHA-256 hex string).
///
/// The inner field is private so the string is always lowercase hex produced
/// by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Digest of a record's canonical JSON.
    pub fn of_record(record: &RunRecord) -> StorageResult<Self> {
        Ok(Self::from_bytes(&serde_json::to_vec(record)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of a sealed run: one task may be run many times.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub task_id: TaskId,
    pub sealed_at: DateTime<Utc>,
}

impl RunKey {
    pub fn of(record: &RunRecord) -> Self {
        RunKey {
            task_id: record.task().id.clone(),
            sealed_at: record.sealed_at(),
        }
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}",
            self.task_id,
            self.sealed_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}

/// Append-only history of sealed run records.
///
/// Guarantees:
/// - `append` never overwrites; a second record with the same key is
///   rejected with `StorageError::DuplicateRecord`.
/// - `get` returns exactly the record that was appended.
/// - `list` returns records in append order.
#[async_trait]
pub trait RunLog: Send + Sync {
    /// Persist a sealed record and return its key.
    async fn append(&self, record: &RunRecord) -> StorageResult<RunKey>;

    /// Retrieve one record. Returns `StorageError::NotFound` if absent.
    async fn get(&self, key: &RunKey) -> StorageResult<RunRecord>;

    /// All records, optionally only those of one task, oldest first.
    async fn list(&self, task_id: Option<&TaskId>) -> StorageResult<Vec<RunRecord>>;

    /// Up to `limit` most recent records, newest first.
    async fn latest(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut records = self.list(None).await?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }
}
