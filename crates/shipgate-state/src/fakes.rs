//! In-memory fakes for storage traits (testing only)

use std::sync::Mutex;

use async_trait::async_trait;

use shipgate_core::{RunRecord, TaskId};

use crate::error::StorageError;
use crate::storage_traits::{RunKey, RunLog, StorageResult};

/// In-memory run log backed by a `Vec` in append order.
#[derive(Debug, Default)]
pub struct MemoryRunLog {
    entries: Mutex<Vec<(RunKey, RunRecord)>>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RunLog for MemoryRunLog {
    async fn append(&self, record: &RunRecord) -> StorageResult<RunKey> {
        let key = RunKey::of(record);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.iter().any(|(k, _)| *k == key) {
            return Err(StorageError::DuplicateRecord {
                key: key.to_string(),
            });
        }
        entries.push((key.clone(), record.clone()));
        Ok(key)
    }

    async fn get(&self, key: &RunKey) -> StorageResult<RunRecord> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, r)| r.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, task_id: Option<&TaskId>) -> StorageResult<Vec<RunRecord>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .filter(|(k, _)| task_id.map(|t| k.task_id == *t).unwrap_or(true))
            .map(|(_, r)| r.clone())
            .collect())
    }
}
