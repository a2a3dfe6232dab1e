//! Domain models for shipgate.
//!
//! Canonical definitions for the core entities:
//! - `Task`: the requested change and its target files
//! - `StageResult`: one attempt of one pipeline stage
//! - `MetricSpec` / `PipelineConfig`: read-only policy
//! - `GateVerdict` / `Decision`: gate outcomes
//! - `RunRecord`: the sealed record of one run

pub mod config;
pub mod error;
pub mod metric;
pub mod run;
pub mod stage;
pub mod task;
pub mod verdict;

pub use config::{PipelineConfig, ProjectConfig, RetryPolicy, Standards, TimeoutPolicy};
pub use error::{ConfigError, InvalidConfig, Result};
pub use metric::{Direction, MetricSpec};
pub use run::{
    DecidedRun, DocsOutcome, PipelineState, RunDraft, RunRecord, RunView, Transition,
};
pub use stage::{MetricMap, StageHistory, StageKind, StageResult};
pub use task::{Task, TaskId};
pub use verdict::{Decision, GateVerdict, VerdictStatus};
