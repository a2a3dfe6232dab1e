//! JSON-lines run log on the local filesystem.
//!
//! Layout: one line per sealed record,
//! `{"key": {...}, "digest": "<sha256 of record JSON>", "record": {...}}`.
//! Lines are only ever appended. Every read re-computes each digest and
//! fails with `DigestMismatch` if a line was altered.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use shipgate_core::{RunRecord, TaskId};

use crate::error::StorageError;
use crate::storage_traits::{ContentDigest, RunKey, RunLog, StorageResult};

/// Default location relative to the project root.
pub const DEFAULT_LOG_PATH: &str = ".shipgate/runs.jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct LogLine {
    key: RunKey,
    digest: ContentDigest,
    record: RunRecord,
}

/// File-backed [`RunLog`]. Appends are serialised through an async mutex so
/// concurrent runs in one process never interleave lines.
#[derive(Debug)]
pub struct FileRunLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_lines(&self) -> StorageResult<Vec<LogLine>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let mut lines = Vec::new();
        for (idx, raw) in content.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let line: LogLine =
                serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
                    path: self.path.clone(),
                    line: idx + 1,
                    reason: e.to_string(),
                })?;

            let actual = ContentDigest::of_record(&line.record)?;
            if actual != line.digest {
                return Err(StorageError::DigestMismatch {
                    key: line.key.to_string(),
                    expected: line.digest.to_string(),
                    actual: actual.to_string(),
                });
            }
            if line.key != RunKey::of(&line.record) {
                return Err(StorageError::Corrupt {
                    path: self.path.clone(),
                    line: idx + 1,
                    reason: format!("key {} does not match its record", line.key),
                });
            }
            lines.push(line);
        }
        Ok(lines)
    }
}

#[async_trait]
impl RunLog for FileRunLog {
    async fn append(&self, record: &RunRecord) -> StorageResult<RunKey> {
        let _guard = self.write_lock.lock().await;

        let key = RunKey::of(record);
        if self.read_lines().await?.iter().any(|l| l.key == key) {
            return Err(StorageError::DuplicateRecord {
                key: key.to_string(),
            });
        }

        let line = LogLine {
            key: key.clone(),
            digest: ContentDigest::of_record(record)?,
            record: record.clone(),
        };
        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;

        debug!(key = %key, digest = %line.digest.short(), "run appended to log");
        Ok(key)
    }

    async fn get(&self, key: &RunKey) -> StorageResult<RunRecord> {
        self.read_lines()
            .await?
            .into_iter()
            .find(|l| l.key == *key)
            .map(|l| l.record)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, task_id: Option<&TaskId>) -> StorageResult<Vec<RunRecord>> {
        Ok(self
            .read_lines()
            .await?
            .into_iter()
            .filter(|l| task_id.map(|t| l.key.task_id == *t).unwrap_or(true))
            .map(|l| l.record)
            .collect())
    }
}
