//! Bounded re-execution of failing stages.

use std::sync::Arc;
use std::time::Duration;

use shipgate_core::metrics::METRICS;
use shipgate_core::{obs, StageKind, StageResult, Task};

use crate::runner::StageRunner;

/// Pause inserted before a retry.
pub trait DelayPolicy: Send + Sync {
    fn delay(&self, kind: StageKind, next_attempt: u32) -> Duration;
}

/// Retry straight away.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl DelayPolicy for Immediate {
    fn delay(&self, _kind: StageKind, _next_attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Same pause before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelayPolicy for FixedDelay {
    fn delay(&self, _kind: StageKind, _next_attempt: u32) -> Duration {
        self.0
    }
}

/// Every attempt made for one stage, in order.
#[derive(Debug, Clone, Default)]
pub struct RetryOutcome {
    pub attempts: Vec<StageResult>,
}

impl RetryOutcome {
    pub fn succeeded(&self) -> bool {
        self.last().is_some_and(|r| r.success)
    }

    pub fn last(&self) -> Option<&StageResult> {
        self.attempts.last()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// Runs a stage until it succeeds or its retries are used up.
#[derive(Clone)]
pub struct RetryController {
    runner: StageRunner,
    delay: Arc<dyn DelayPolicy>,
}

impl RetryController {
    pub fn new(runner: StageRunner, delay: Arc<dyn DelayPolicy>) -> Self {
        Self { runner, delay }
    }

    pub fn runner(&self) -> &StageRunner {
        &self.runner
    }

    /// At most `retry_cap + 1` attempts, numbered from 1.
    pub async fn run_with_retry(&self, kind: StageKind, task: &Task, retry_cap: u32) -> RetryOutcome {
        self.run_from(kind, task, 1, retry_cap).await
    }

    /// Attempts numbered from `first_attempt`, with at most `max_retries`
    /// after the first. Stops at the first success.
    pub async fn run_from(
        &self,
        kind: StageKind,
        task: &Task,
        first_attempt: u32,
        max_retries: u32,
    ) -> RetryOutcome {
        let mut outcome = RetryOutcome::default();
        let last_attempt = first_attempt.saturating_add(max_retries);
        let mut attempt = first_attempt;

        loop {
            let result = self.runner.run(kind, task, attempt).await;
            let success = result.success;
            outcome.attempts.push(result);
            if success || attempt >= last_attempt {
                break;
            }

            attempt += 1;
            let pause = self.delay.delay(kind, attempt);
            obs::emit_retry_scheduled(
                task.id.as_str(),
                kind.name(),
                attempt,
                pause.as_millis() as u64,
            );
            METRICS.inc_retries();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        outcome
    }
}
