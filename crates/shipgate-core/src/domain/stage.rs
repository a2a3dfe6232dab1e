//! Pipeline stages and their recorded results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskId;

/// Measured values reported by a stage, keyed by metric name.
pub type MetricMap = BTreeMap<String, f64>;

/// The fixed set of pipeline stages.
///
/// Declaration order is the pipeline's total order; `Docs` is conditional
/// and only runs after a PROMOTE decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Build,
    Ci,
    Review,
    Security,
    Docs,
}

impl StageKind {
    /// Stages that run unconditionally, in order.
    pub const GATED: [StageKind; 4] = [
        StageKind::Build,
        StageKind::Ci,
        StageKind::Review,
        StageKind::Security,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Build => "build",
            StageKind::Ci => "ci",
            StageKind::Review => "review",
            StageKind::Security => "security",
            StageKind::Docs => "docs",
        }
    }

    /// Upper-case label used in reports and transitions.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Build => "BUILD",
            StageKind::Ci => "CI",
            StageKind::Review => "REVIEW",
            StageKind::Security => "SECURITY",
            StageKind::Docs => "DOCS",
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, StageKind::Docs)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one attempt of one stage.
///
/// Immutable once recorded. Several results may exist for the same kind
/// within a run; the one with the highest `attempt` is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub kind: StageKind,
    pub task_id: TaskId,
    pub success: bool,

    /// Diagnostics in the order they were produced.
    pub messages: Vec<String>,

    pub metrics: MetricMap,
    pub duration_ms: u64,

    /// 1-based attempt number.
    pub attempt: u32,

    /// Set when the attempt was cut off by the stage timeout.
    #[serde(default)]
    pub timed_out: bool,

    pub started_at: DateTime<Utc>,
}

impl StageResult {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// First diagnostic, if any. Used for one-line summaries.
    pub fn headline(&self) -> Option<&str> {
        self.messages.first().map(String::as_str)
    }
}

/// Ordered stage results across all attempts of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageHistory(Vec<StageResult>);

impl StageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: StageResult) {
        self.0.push(result);
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All attempts of one stage, oldest first.
    pub fn of(&self, kind: StageKind) -> impl Iterator<Item = &StageResult> {
        self.0.iter().filter(move |r| r.kind == kind)
    }

    /// Number of recorded attempts for `kind`.
    pub fn attempts(&self, kind: StageKind) -> u32 {
        self.of(kind).count() as u32
    }

    /// The authoritative (last) result for `kind`.
    pub fn latest(&self, kind: StageKind) -> Option<&StageResult> {
        self.0.iter().rev().find(|r| r.kind == kind)
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.0.iter().map(|r| r.duration_ms).sum()
    }
}
