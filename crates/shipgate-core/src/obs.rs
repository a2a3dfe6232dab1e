//! Structured observability hooks for pipeline run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via [`run_span`]
//! - Emission functions for run, stage, gate and persistence events
//!
//! Every event carries a fixed `event` field so log pipelines can filter on
//! it. Events are emitted at `info!` level unless noted otherwise.

use tracing::{debug, info, warn, Span};

/// Run-scoped span tagged with the task id.
///
/// Attach it to the run's future with `tracing::Instrument` so that every
/// event emitted while the run is polled carries the task id.
///
/// # Example
///
/// ```ignore
/// orchestrator.run(task, &flag).instrument(run_span("task-1a2b3c4d5e6f")).await
/// ```
pub fn run_span(task_id: &str) -> Span {
    tracing::info_span!("shipgate.run", task_id = %task_id)
}

/// Emit event: run started.
pub fn emit_run_started(task_id: &str, run_id: &str, targets: usize) {
    info!(event = "run.started", task_id = %task_id, run_id = %run_id, targets = targets);
}

/// Emit event: one stage attempt finished.
pub fn emit_stage_finished(task_id: &str, stage: &str, attempt: u32, success: bool, duration_ms: u64) {
    info!(
        event = "stage.finished",
        task_id = %task_id,
        stage = %stage,
        attempt = attempt,
        success = success,
        duration_ms = duration_ms,
    );
}

/// Emit event: a failed stage will be attempted again.
pub fn emit_retry_scheduled(task_id: &str, stage: &str, next_attempt: u32, delay_ms: u64) {
    info!(
        event = "stage.retry_scheduled",
        task_id = %task_id,
        stage = %stage,
        next_attempt = next_attempt,
        delay_ms = delay_ms,
    );
}

/// Emit event: a stage attempt hit its timeout (warning level).
pub fn emit_stage_timeout(task_id: &str, stage: &str, attempt: u32, timeout_ms: u64) {
    warn!(
        event = "stage.timeout",
        task_id = %task_id,
        stage = %stage,
        attempt = attempt,
        timeout_ms = timeout_ms,
    );
}

/// Emit event: state machine transition (debug level).
pub fn emit_transition(task_id: &str, from: &str, to: &str, reason: &str) {
    debug!(event = "pipeline.transition", task_id = %task_id, from = %from, to = %to, reason = %reason);
}

/// Emit event: gates evaluated.
pub fn emit_gate_evaluated(task_id: &str, total: usize, blocking: usize, warnings: usize) {
    info!(
        event = "gate.evaluated",
        task_id = %task_id,
        total = total,
        blocking = blocking,
        warnings = warnings,
    );
}

/// Emit event: decision fixed for the run.
pub fn emit_run_decided(task_id: &str, decision: &str, duration_ms: u64, docs_executed: bool) {
    info!(
        event = "run.decided",
        task_id = %task_id,
        decision = %decision,
        duration_ms = duration_ms,
        docs_executed = docs_executed,
    );
}

/// Emit event: run cancelled between stages (warning level).
pub fn emit_run_cancelled(task_id: &str, before_stage: &str) {
    warn!(event = "run.cancelled", task_id = %task_id, before_stage = %before_stage);
}

/// Emit event: sealed record could not be persisted or delivered (warning level).
pub fn emit_persist_error(task_id: &str, target: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.persist_error", task_id = %task_id, target = %target, error = %error);
}
