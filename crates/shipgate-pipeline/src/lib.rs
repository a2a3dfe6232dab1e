//! shipgate pipeline
//!
//! Executes tasks through BUILD, CI, REVIEW and SECURITY with bounded retries
//! and per-stage timeouts, turns the results into a PROMOTE or HOLD decision,
//! and persists the sealed run.
//!
//! All tool work goes through [`ToolInvoker`]; [`CommandInvoker`] runs the
//! project's configured shell commands and [`fakes::ScriptedInvoker`] plays
//! back scripted outcomes in tests.

pub mod command;
pub mod error;
pub mod fakes;
pub mod invoker;
pub mod parse;
pub mod pipeline;
pub mod plan;
pub mod retry;
pub mod runner;
pub mod sink;

pub use command::{tool_key, CommandInvoker};
pub use error::{PipelineError, Result};
pub use invoker::{ToolInvoker, ToolOutput};
pub use pipeline::{CancellationFlag, Orchestrator, CANCELLATION_GATE};
pub use plan::{PipelinePlan, PlannedStage};
pub use retry::{DelayPolicy, FixedDelay, Immediate, RetryController, RetryOutcome};
pub use runner::{StageRunner, TIMEOUT_MESSAGE};
pub use sink::{JsonDirSink, ReportSink};
