//! Stage execution.
//!
//! [`StageRunner`] runs one attempt of one stage through the [`ToolInvoker`]
//! and always produces a [`StageResult`]. Collaborator errors, panics and
//! timeouts become failed results; they never escape as errors.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinError;
use tokio::time::Instant;

use shipgate_core::metrics::METRICS;
use shipgate_core::{obs, MetricMap, ProjectConfig, StageKind, StageResult, Task, TimeoutPolicy};

use crate::invoker::{ToolInvoker, ToolOutput};

/// Message recorded for an attempt cut off by its timeout.
pub const TIMEOUT_MESSAGE: &str = "timeout";

/// Runs single stage attempts with timeout and crash capture.
#[derive(Clone)]
pub struct StageRunner {
    invoker: Arc<dyn ToolInvoker>,
    project: Arc<ProjectConfig>,
    timeouts: TimeoutPolicy,
}

impl StageRunner {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        project: Arc<ProjectConfig>,
        timeouts: TimeoutPolicy,
    ) -> Self {
        Self {
            invoker,
            project,
            timeouts,
        }
    }

    /// Execute attempt number `attempt` of `kind` for `task`.
    pub async fn run(&self, kind: StageKind, task: &Task, attempt: u32) -> StageResult {
        let started_at = Utc::now();
        let start = Instant::now();
        METRICS.inc_stage_attempts();

        let invoker = Arc::clone(&self.invoker);
        let project = Arc::clone(&self.project);
        let owned_task = task.clone();
        let mut handle =
            tokio::spawn(async move { invoker.invoke(kind, &owned_task, &project).await });

        let (outcome, timed_out) = match self.timeouts.for_stage(kind) {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => (joined, false),
                Err(_) => {
                    handle.abort();
                    METRICS.inc_timeouts();
                    obs::emit_stage_timeout(
                        task.id.as_str(),
                        kind.name(),
                        attempt,
                        limit.as_millis() as u64,
                    );
                    (Ok(Ok(ToolOutput::failed(TIMEOUT_MESSAGE))), true)
                }
            },
            None => (handle.await, false),
        };

        let mut output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => ToolOutput::failed(format!("collaborator error: {e:#}")),
            Err(join) => ToolOutput::failed(describe_join_error(join)),
        };

        let (metrics, dropped) = finite_metrics(output.metrics);
        output.messages.extend(
            dropped
                .into_iter()
                .map(|name| format!("dropped non-finite measurement {name}")),
        );

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_stage_finished(
            task.id.as_str(),
            kind.name(),
            attempt,
            output.success && !timed_out,
            duration_ms,
        );

        StageResult {
            kind,
            task_id: task.id.clone(),
            success: output.success && !timed_out,
            messages: normalize(output.messages),
            metrics,
            duration_ms,
            attempt,
            timed_out,
            started_at,
        }
    }
}

/// Split multi-line diagnostics, trim them and drop blanks.
fn normalize(messages: Vec<String>) -> Vec<String> {
    messages
        .iter()
        .flat_map(|m| m.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep finite measurements; NaN and infinities cannot be persisted as JSON.
fn finite_metrics(metrics: MetricMap) -> (MetricMap, Vec<String>) {
    let mut dropped = Vec::new();
    let kept = metrics
        .into_iter()
        .filter(|(name, value)| {
            if value.is_finite() {
                true
            } else {
                dropped.push(name.clone());
                false
            }
        })
        .collect();
    (kept, dropped)
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("collaborator panicked: {}", panic_message(err.into_panic()))
    } else {
        "collaborator task cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
