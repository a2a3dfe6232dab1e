//! shipgate core library
//!
//! Domain model, configuration, metric evaluation and gate aggregation for a
//! staged change pipeline that ends in a PROMOTE or HOLD decision. Everything
//! here is synchronous and free of I/O apart from logging.

pub mod domain;
pub mod gate;
pub mod metric_eval;
pub mod metrics;
pub mod obs;
pub mod reporting;
pub mod telemetry;
pub mod templates;

pub use domain::{
    ConfigError, DecidedRun, Decision, Direction, DocsOutcome, GateVerdict, InvalidConfig,
    MetricMap, MetricSpec, PipelineConfig, PipelineState, ProjectConfig, RetryPolicy, RunDraft,
    RunRecord, RunView, StageHistory, StageKind, StageResult, Standards, Task, TaskId,
    TimeoutPolicy, Transition, VerdictStatus,
};
pub use gate::{aggregate, GateOutcome};
pub use metric_eval::evaluate;
pub use reporting::render_run_report;
pub use templates::{ProjectKind, UnknownProjectKind};

/// Crate version, stamped into exported configuration and `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
