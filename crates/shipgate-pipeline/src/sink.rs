//! Report delivery for sealed runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use shipgate_core::RunRecord;

use crate::error::Result;

/// Receives every sealed run after it has been persisted.
///
/// Sink failures are logged by the orchestrator and never alter the run.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn emit(&self, record: &RunRecord) -> Result<()>;
}

/// Writes each run as pretty JSON into a directory.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a record is written to.
    pub fn path_for(&self, record: &RunRecord) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", record.task().id, record.run_id()))
    }
}

#[async_trait]
impl ReportSink for JsonDirSink {
    async fn emit(&self, record: &RunRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.path_for(record), json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipgate_core::{Decision, RunDraft, Task};

    #[tokio::test]
    async fn test_json_dir_sink_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path().join("reports"));
        let record = RunDraft::new(Task::new("x").with_id("t-sink"), "cfg")
            .decide(Decision::Hold, vec![])
            .seal();

        sink.emit(&record).await.unwrap();

        let written = std::fs::read_to_string(sink.path_for(&record)).unwrap();
        let back: RunRecord = serde_json::from_str(&written).unwrap();
        assert_eq!(back, record);
    }
}
