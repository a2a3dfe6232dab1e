//! Tool invocation boundary.
//!
//! Everything non-deterministic (compilers, test runners, scanners, code
//! generators) sits behind [`ToolInvoker`]. The pipeline never inspects how a
//! stage's work is done, only the [`ToolOutput`] it reports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use shipgate_core::{MetricMap, ProjectConfig, StageKind, Task};

/// Raw outcome reported by a collaborator for one stage invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub messages: Vec<String>,
    pub metrics: MetricMap,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Capability to execute one stage's work for a task.
///
/// Implementations may be slow and may fail; an `Err` is treated the same as
/// a crash and recorded as a failed attempt.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        kind: StageKind,
        task: &Task,
        project: &ProjectConfig,
    ) -> anyhow::Result<ToolOutput>;
}
