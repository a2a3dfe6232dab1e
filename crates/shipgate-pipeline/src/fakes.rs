//! Scripted collaborators for tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use shipgate_core::{ProjectConfig, RunRecord, StageKind, Task, TaskId};

use crate::error::Result;
use crate::invoker::{ToolInvoker, ToolOutput};
use crate::sink::ReportSink;

/// What a scripted invocation does.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(ToolOutput),
    /// Report failure with one diagnostic.
    Fail(String),
    /// Return an `Err` from the invoker.
    Error(String),
    Panic(String),
    /// Never complete.
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    queued: BTreeMap<StageKind, VecDeque<Step>>,
    fallback: BTreeMap<StageKind, Step>,
    invocations: Vec<(StageKind, TaskId)>,
}

/// Invoker that plays back queued steps per stage.
///
/// Queued steps are consumed first, then the stage's `always` step, then a
/// plain success.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    script: Mutex<Script>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `step` for the next unscripted call of `kind`.
    pub fn then(self, kind: StageKind, step: Step) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queued
            .entry(kind)
            .or_default()
            .push_back(step);
        self
    }

    /// Play `step` for every call of `kind` once its queue is empty.
    pub fn always(self, kind: StageKind, step: Step) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fallback
            .insert(kind, step);
        self
    }

    pub fn calls(&self, kind: StageKind) -> usize {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .invocations
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Every call in order.
    pub fn invocations(&self) -> Vec<(StageKind, TaskId)> {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .invocations
            .clone()
    }

    fn next_step(&self, kind: StageKind, task: &Task) -> Step {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.invocations.push((kind, task.id.clone()));
        if let Some(step) = script.queued.get_mut(&kind).and_then(VecDeque::pop_front) {
            return step;
        }
        script
            .fallback
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Step::Succeed(ToolOutput::succeeded()))
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        kind: StageKind,
        task: &Task,
        _project: &ProjectConfig,
    ) -> anyhow::Result<ToolOutput> {
        match self.next_step(kind, task) {
            Step::Succeed(output) => Ok(output),
            Step::Fail(message) => Ok(ToolOutput::failed(message)),
            Step::Error(message) => Err(anyhow::anyhow!(message)),
            Step::Panic(message) => panic!("{message}"),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Sink that keeps every record it receives, or fails every call.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<RunRecord>>,
    fail: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ReportSink for CollectingSink {
    async fn emit(&self, record: &RunRecord) -> Result<()> {
        if self.fail {
            return Err(std::io::Error::other("sink unavailable").into());
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
