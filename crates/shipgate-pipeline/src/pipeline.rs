//! Pipeline orchestration.
//!
//! [`Orchestrator`] drives one task through
//! `TASK -> BUILD -> CI -> REVIEW -> SECURITY -> DECIDE -> DOCS -> REPORT`,
//! records every transition, aggregates gates into a decision, seals the run,
//! appends it to the owned [`RunLog`] and hands it to each [`ReportSink`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::Instrument;

use shipgate_core::metrics::METRICS;
use shipgate_core::{
    aggregate, obs, DecidedRun, Decision, GateVerdict, PipelineConfig, PipelineState,
    ProjectConfig, RunDraft, RunRecord, RunView, StageKind, StageResult, Task, VerdictStatus,
};
use shipgate_state::RunLog;

use crate::error::Result;
use crate::invoker::ToolInvoker;
use crate::plan::PipelinePlan;
use crate::retry::{DelayPolicy, FixedDelay, Immediate, RetryController};
use crate::runner::StageRunner;
use crate::sink::ReportSink;

/// Gate name of the verdict added when a run is cancelled after its last stage.
pub const CANCELLATION_GATE: &str = "cancellation";

/// User-initiated abort, observed between stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives tasks through the stage state machine.
pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    project: Arc<ProjectConfig>,
    invoker: Arc<dyn ToolInvoker>,
    log: Arc<dyn RunLog>,
    sinks: Vec<Arc<dyn ReportSink>>,
    delay: Arc<dyn DelayPolicy>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, invoker: Arc<dyn ToolInvoker>, log: Arc<dyn RunLog>) -> Self {
        let delay: Arc<dyn DelayPolicy> = match config.retry.delay_ms {
            0 => Arc::new(Immediate),
            ms => Arc::new(FixedDelay(Duration::from_millis(ms))),
        };
        Self {
            project: Arc::new(config.project.clone()),
            config: Arc::new(config),
            invoker,
            log,
            sinks: Vec::new(),
            delay,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_delay_policy(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.delay = delay;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// What `run` would execute for `task`. Invokes nothing.
    pub fn plan(&self, task: &Task) -> Result<PipelinePlan> {
        self.config.validate()?;
        Ok(PipelinePlan::build(task, &self.config))
    }

    /// Run `task` to a sealed record.
    ///
    /// Fails only when the configuration is invalid, before any stage runs.
    /// Stage failures, timeouts and cancellation all end in a HOLD record.
    pub async fn run(&self, task: Task, cancel: &CancellationFlag) -> Result<RunRecord> {
        self.config.validate()?;
        let span = obs::run_span(task.id.as_str());
        Ok(self.execute(task, cancel).instrument(span).await)
    }

    /// Run independent tasks concurrently. Results keep the input order.
    pub async fn run_many(
        &self,
        tasks: Vec<Task>,
        cancel: &CancellationFlag,
    ) -> Vec<Result<RunRecord>> {
        join_all(tasks.into_iter().map(|task| self.run(task, cancel))).await
    }

    fn controller(&self) -> RetryController {
        let runner = StageRunner::new(
            Arc::clone(&self.invoker),
            Arc::clone(&self.project),
            self.config.timeouts.clone(),
        );
        RetryController::new(runner, Arc::clone(&self.delay))
    }

    async fn execute(&self, task: Task, cancel: &CancellationFlag) -> RunRecord {
        let mut draft = RunDraft::new(task.clone(), self.config.digest());
        let task_id = task.id.as_str();
        obs::emit_run_started(task_id, &draft.run_id().to_string(), task.targets.len());
        METRICS.inc_runs_started();

        let retry = self.controller();
        advance(&mut draft, PipelineState::Task, PipelineState::Build, "run created");

        if self.build_and_test(&mut draft, &task, cancel, &retry).await {
            self.inspect(&mut draft, &task, cancel, &retry).await;
        }
        if !draft.is_cancelled() && cancel.is_cancelled() {
            halt(&mut draft, PipelineState::Decide);
        }

        let mut outcome = aggregate(&draft, &self.config);
        if draft.is_cancelled() {
            outcome.verdicts.push(
                GateVerdict::fail(CANCELLATION_GATE, "run cancelled before completion").mandatory(),
            );
            outcome.decision = Decision::Hold;
        }
        obs::emit_gate_evaluated(
            task_id,
            outcome.verdicts.len(),
            outcome.blocking().count(),
            outcome.count(VerdictStatus::Warn),
        );

        let mut decided = draft.decide(outcome.decision, outcome.verdicts);
        self.finish(&mut decided, &task, &retry).await;
        let record = decided.seal();

        match record.decision() {
            Decision::Promote => METRICS.inc_promoted(),
            Decision::Hold => METRICS.inc_held(),
        }
        obs::emit_run_decided(
            task_id,
            &record.decision().to_string(),
            record.duration_ms(),
            record.docs_executed(),
        );

        self.publish(&record).await;
        record
    }

    /// BUILD then CI. Returns whether both ended in success.
    async fn build_and_test(
        &self,
        draft: &mut RunDraft,
        task: &Task,
        cancel: &CancellationFlag,
        retry: &RetryController,
    ) -> bool {
        if self.config.retry.rebuild_before_ci_retry {
            return self.build_and_test_with_rebuild(draft, task, cancel, retry).await;
        }
        let policy = &self.config.retry;

        if check_cancel(draft, cancel, PipelineState::Build) {
            return false;
        }
        let build = retry
            .run_with_retry(StageKind::Build, task, policy.retries_for(StageKind::Build))
            .await;
        let (ok, tries) = (build.succeeded(), build.len());
        record_attempts(draft, StageKind::Build, build.attempts);
        if !ok {
            advance(
                draft,
                PipelineState::Build,
                PipelineState::Decide,
                format!("build failed after {tries} attempt(s); skipping CI, REVIEW and SECURITY"),
            );
            return false;
        }
        advance(draft, PipelineState::Build, PipelineState::Ci, "build succeeded");

        if check_cancel(draft, cancel, PipelineState::Ci) {
            return false;
        }
        let ci = retry
            .run_with_retry(StageKind::Ci, task, policy.retries_for(StageKind::Ci))
            .await;
        let (ok, tries) = (ci.succeeded(), ci.len());
        record_attempts(draft, StageKind::Ci, ci.attempts);
        if !ok {
            advance(
                draft,
                PipelineState::Ci,
                PipelineState::Decide,
                format!("ci failed after {tries} attempt(s); skipping REVIEW and SECURITY"),
            );
            return false;
        }
        advance(draft, PipelineState::Ci, PipelineState::Review, "ci succeeded");
        true
    }

    /// BUILD and CI sharing one retry budget; a failed CI goes back to BUILD.
    async fn build_and_test_with_rebuild(
        &self,
        draft: &mut RunDraft,
        task: &Task,
        cancel: &CancellationFlag,
        retry: &RetryController,
    ) -> bool {
        let policy = &self.config.retry;
        let mut budget = policy.retry_cap;
        let mut next_build = 1;
        let mut next_ci = 1;

        loop {
            if check_cancel(draft, cancel, PipelineState::Build) {
                return false;
            }
            let build_retries = if policy.is_retryable(StageKind::Build) {
                budget
            } else {
                0
            };
            let build = retry
                .run_from(StageKind::Build, task, next_build, build_retries)
                .await;
            let tries = build.len() as u32;
            let ok = build.succeeded();
            budget -= tries.saturating_sub(1);
            next_build += tries;
            record_attempts(draft, StageKind::Build, build.attempts);
            if !ok {
                advance(
                    draft,
                    PipelineState::Build,
                    PipelineState::Decide,
                    format!(
                        "build failed after {} attempt(s); skipping CI, REVIEW and SECURITY",
                        next_build - 1
                    ),
                );
                return false;
            }
            advance(draft, PipelineState::Build, PipelineState::Ci, "build succeeded");

            if check_cancel(draft, cancel, PipelineState::Ci) {
                return false;
            }
            let ci = retry.runner().run(StageKind::Ci, task, next_ci).await;
            let ok = ci.success;
            draft.record_stage(ci);
            if ok {
                advance(draft, PipelineState::Ci, PipelineState::Review, "ci succeeded");
                return true;
            }
            if !policy.is_retryable(StageKind::Ci) || budget == 0 {
                advance(
                    draft,
                    PipelineState::Ci,
                    PipelineState::Decide,
                    format!("ci failed after {next_ci} attempt(s); skipping REVIEW and SECURITY"),
                );
                return false;
            }

            budget -= 1;
            next_ci += 1;
            let pause = self.delay.delay(StageKind::Ci, next_ci);
            obs::emit_retry_scheduled(
                task.id.as_str(),
                StageKind::Ci.name(),
                next_ci,
                pause.as_millis() as u64,
            );
            METRICS.inc_retries();
            advance(
                draft,
                PipelineState::Ci,
                PipelineState::Build,
                format!("ci attempt {} failed; rebuilding", next_ci - 1),
            );
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
    }

    /// REVIEW then SECURITY. Both always run once CI has passed.
    async fn inspect(
        &self,
        draft: &mut RunDraft,
        task: &Task,
        cancel: &CancellationFlag,
        retry: &RetryController,
    ) {
        for (kind, next) in [
            (StageKind::Review, PipelineState::Security),
            (StageKind::Security, PipelineState::Decide),
        ] {
            if check_cancel(draft, cancel, kind.into()) {
                return;
            }
            let outcome = retry
                .run_with_retry(kind, task, self.config.retry.retries_for(kind))
                .await;
            let status = if outcome.succeeded() { "passed" } else { "reported findings" };
            record_attempts(draft, kind, outcome.attempts);
            advance(draft, kind.into(), next, format!("{} {status}", kind.name()));
        }
    }

    /// DECIDE onwards: advisory DOCS after PROMOTE, then REPORT.
    async fn finish(&self, decided: &mut DecidedRun, task: &Task, retry: &RetryController) {
        if decided.decision() == Decision::Hold {
            advance_decided(decided, PipelineState::Decide, PipelineState::Report, "held");
            return;
        }
        if !self.config.docs_enabled {
            advance_decided(
                decided,
                PipelineState::Decide,
                PipelineState::Report,
                "promoted; docs disabled",
            );
            return;
        }

        advance_decided(decided, PipelineState::Decide, PipelineState::Docs, "promoted");
        let docs = retry.runner().run(StageKind::Docs, task, 1).await;
        let reason = if docs.success {
            "docs updated"
        } else {
            "docs failed (advisory)"
        };
        decided.record_docs(docs);
        advance_decided(decided, PipelineState::Docs, PipelineState::Report, reason);
    }

    /// Persist and deliver. Failures are logged and never change the record.
    async fn publish(&self, record: &RunRecord) {
        let task_id = record.task().id.as_str();
        if let Err(e) = self.log.append(record).await {
            obs::emit_persist_error(task_id, "run_log", &e);
        }
        for sink in &self.sinks {
            if let Err(e) = sink.emit(record).await {
                obs::emit_persist_error(task_id, "report_sink", &e);
            }
        }
    }
}

fn advance(draft: &mut RunDraft, from: PipelineState, to: PipelineState, reason: impl Into<String>) {
    let reason = reason.into();
    obs::emit_transition(
        draft.task().id.as_str(),
        &from.to_string(),
        &to.to_string(),
        &reason,
    );
    draft.transition(from, to, reason);
}

fn advance_decided(
    decided: &mut DecidedRun,
    from: PipelineState,
    to: PipelineState,
    reason: impl Into<String>,
) {
    let reason = reason.into();
    obs::emit_transition(
        decided.task().id.as_str(),
        &from.to_string(),
        &to.to_string(),
        &reason,
    );
    decided.transition(from, to, reason);
}

/// Record every attempt, with a self-transition before each retry.
fn record_attempts(draft: &mut RunDraft, kind: StageKind, attempts: Vec<StageResult>) {
    let mut first = true;
    for result in attempts {
        if !first {
            advance(
                draft,
                kind.into(),
                kind.into(),
                format!("{} attempt {} failed; retrying", kind.name(), result.attempt - 1),
            );
        }
        first = false;
        draft.record_stage(result);
    }
}

fn halt(draft: &mut RunDraft, before: PipelineState) {
    draft.mark_cancelled();
    obs::emit_run_cancelled(draft.task().id.as_str(), &before.to_string());
}

/// Stop before `state` when cancellation was requested.
fn check_cancel(draft: &mut RunDraft, cancel: &CancellationFlag, state: PipelineState) -> bool {
    if !cancel.is_cancelled() {
        return false;
    }
    halt(draft, state);
    advance(
        draft,
        state,
        PipelineState::Decide,
        format!("cancelled before {state}"),
    );
    true
}
