//! Run lifecycle: draft -> decided -> sealed record.
//!
//! The three types form a one-way progression. A [`RunDraft`] collects stage
//! results and transitions while stages execute. [`RunDraft::decide`] fixes
//! the decision and verdicts, yielding a [`DecidedRun`] that may only record
//! the advisory DOCS stage. [`DecidedRun::seal`] produces the immutable
//! [`RunRecord`] that is persisted and reported.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::stage::{StageHistory, StageKind, StageResult};
use super::task::Task;
use super::verdict::{Decision, GateVerdict};

/// States of the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Task,
    Build,
    Ci,
    Review,
    Security,
    Decide,
    Docs,
    Report,
}

impl From<StageKind> for PipelineState {
    fn from(kind: StageKind) -> Self {
        match kind {
            StageKind::Build => PipelineState::Build,
            StageKind::Ci => PipelineState::Ci,
            StageKind::Review => PipelineState::Review,
            StageKind::Security => PipelineState::Security,
            StageKind::Docs => PipelineState::Docs,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Task => "TASK",
            PipelineState::Build => "BUILD",
            PipelineState::Ci => "CI",
            PipelineState::Review => "REVIEW",
            PipelineState::Security => "SECURITY",
            PipelineState::Decide => "DECIDE",
            PipelineState::Docs => "DOCS",
            PipelineState::Report => "REPORT",
        })
    }
}

/// One edge taken through the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Advisory outcome of the DOCS stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocsOutcome {
    NotRun,
    Succeeded,
    Failed { reason: String },
}

/// Read access shared by drafts and sealed records.
pub trait RunView {
    fn history(&self) -> &StageHistory;
    fn is_cancelled(&self) -> bool;
}

/// A run in progress.
#[derive(Debug, Clone)]
pub struct RunDraft {
    run_id: Uuid,
    task: Task,
    config_digest: String,
    started_at: DateTime<Utc>,
    history: StageHistory,
    transitions: Vec<Transition>,
    cancelled: bool,
}

impl RunDraft {
    pub fn new(task: Task, config_digest: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task,
            config_digest: config_digest.into(),
            started_at: Utc::now(),
            history: StageHistory::new(),
            transitions: Vec::new(),
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn record_stage(&mut self, result: StageResult) {
        self.history.push(result);
    }

    pub fn transition(&mut self, from: PipelineState, to: PipelineState, reason: impl Into<String>) {
        self.transitions.push(Transition {
            from,
            to,
            reason: reason.into(),
            at: Utc::now(),
        });
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Fix the decision. Nothing recorded afterwards can change it.
    pub fn decide(self, decision: Decision, verdicts: Vec<GateVerdict>) -> DecidedRun {
        DecidedRun {
            draft: self,
            decision,
            verdicts,
            docs: DocsOutcome::NotRun,
        }
    }
}

impl RunView for RunDraft {
    fn history(&self) -> &StageHistory {
        &self.history
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// A run whose decision is fixed but which is not yet sealed.
#[derive(Debug, Clone)]
pub struct DecidedRun {
    draft: RunDraft,
    decision: Decision,
    verdicts: Vec<GateVerdict>,
    docs: DocsOutcome,
}

impl DecidedRun {
    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn verdicts(&self) -> &[GateVerdict] {
        &self.verdicts
    }

    pub fn task(&self) -> &Task {
        &self.draft.task
    }

    pub fn is_cancelled(&self) -> bool {
        self.draft.cancelled
    }

    pub fn transition(&mut self, from: PipelineState, to: PipelineState, reason: impl Into<String>) {
        self.draft.transition(from, to, reason);
    }

    /// Record the DOCS attempt. Its failure is advisory only.
    pub fn record_docs(&mut self, result: StageResult) {
        self.docs = if result.success {
            DocsOutcome::Succeeded
        } else {
            DocsOutcome::Failed {
                reason: result
                    .headline()
                    .unwrap_or("docs stage failed")
                    .to_string(),
            }
        };
        self.draft.record_stage(result);
    }

    pub fn seal(self) -> RunRecord {
        let RunDraft {
            run_id,
            task,
            config_digest,
            started_at,
            history,
            transitions,
            cancelled,
        } = self.draft;

        RunRecord {
            run_id,
            task,
            config_digest,
            stages: history,
            transitions,
            verdicts: self.verdicts,
            decision: self.decision,
            docs: self.docs,
            cancelled,
            started_at,
            sealed_at: Utc::now(),
        }
    }
}

/// The sealed, read-only record of one task's pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    run_id: Uuid,
    task: Task,
    config_digest: String,
    stages: StageHistory,
    transitions: Vec<Transition>,
    verdicts: Vec<GateVerdict>,
    decision: Decision,
    docs: DocsOutcome,
    cancelled: bool,
    started_at: DateTime<Utc>,
    sealed_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Digest of the configuration the run was evaluated under.
    pub fn config_digest(&self) -> &str {
        &self.config_digest
    }

    pub fn stages(&self) -> &StageHistory {
        &self.stages
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn verdicts(&self) -> &[GateVerdict] {
        &self.verdicts
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn docs(&self) -> &DocsOutcome {
        &self.docs
    }

    pub fn docs_executed(&self) -> bool {
        self.docs != DocsOutcome::NotRun
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn sealed_at(&self) -> DateTime<Utc> {
        self.sealed_at
    }

    pub fn duration_ms(&self) -> u64 {
        (self.sealed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub fn blocking_verdicts(&self) -> impl Iterator<Item = &GateVerdict> {
        self.verdicts.iter().filter(|v| v.blocks())
    }

    /// SHA-256 hex digest of the record's canonical JSON.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

impl RunView for RunRecord {
    fn history(&self) -> &StageHistory {
        &self.stages
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage::MetricMap;
    use crate::domain::verdict::VerdictStatus;

    fn stage(task: &Task, kind: StageKind, success: bool) -> StageResult {
        StageResult {
            kind,
            task_id: task.id.clone(),
            success,
            messages: if success {
                vec![]
            } else {
                vec!["mkdocs: missing nav entry".to_string()]
            },
            metrics: MetricMap::new(),
            duration_ms: 5,
            attempt: 1,
            timed_out: false,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_seal_carries_everything_recorded() {
        let task = Task::new("add endpoint").with_id("t-seal");
        let mut draft = RunDraft::new(task.clone(), "cfg");
        draft.transition(PipelineState::Task, PipelineState::Build, "run created");
        draft.record_stage(stage(&task, StageKind::Build, true));

        let decided = draft.decide(
            Decision::Promote,
            vec![GateVerdict::pass("build", "ok").mandatory()],
        );
        let record = decided.seal();

        assert_eq!(record.task().id.as_str(), "t-seal");
        assert_eq!(record.stages().len(), 1);
        assert_eq!(record.transitions().len(), 1);
        assert_eq!(record.decision(), Decision::Promote);
        assert!(!record.docs_executed());
        assert_eq!(record.config_digest(), "cfg");
        assert!(record.sealed_at() >= record.started_at());
    }

    #[test]
    fn test_docs_failure_is_advisory() {
        let task = Task::new("docs").with_id("t-docs");
        let draft = RunDraft::new(task.clone(), "cfg");
        let mut decided = draft.decide(Decision::Promote, vec![]);
        decided.record_docs(stage(&task, StageKind::Docs, false));
        let record = decided.seal();

        assert_eq!(record.decision(), Decision::Promote);
        assert!(record.docs_executed());
        assert_eq!(
            record.docs(),
            &DocsOutcome::Failed {
                reason: "mkdocs: missing nav entry".to_string()
            }
        );
        assert_eq!(record.stages().attempts(StageKind::Docs), 1);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let task = Task::new("roundtrip").with_id("t-json");
        let draft = RunDraft::new(task, "cfg");
        let record = draft
            .decide(
                Decision::Hold,
                vec![GateVerdict::fail("build", "exit 2").mandatory()],
            )
            .seal();

        let json = serde_json::to_string(&record).unwrap();
        let back: RunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.digest(), record.digest());
        assert_eq!(back.verdicts()[0].status, VerdictStatus::Fail);
        assert_eq!(back.blocking_verdicts().count(), 1);
    }
}
