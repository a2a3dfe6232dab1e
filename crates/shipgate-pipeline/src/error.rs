//! Pipeline error types.

use thiserror::Error;

use shipgate_core::InvalidConfig;
use shipgate_state::StorageError;

/// Errors surfaced by the orchestrator and report sinks.
///
/// Stage failures are never errors; they are recorded in the run. Only an
/// invalid configuration aborts a run, and it does so before any stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] InvalidConfig),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
