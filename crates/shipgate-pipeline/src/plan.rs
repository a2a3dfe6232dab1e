//! Dry-run view of what a run would execute.

use std::fmt;

use serde::{Deserialize, Serialize};

use shipgate_core::{PipelineConfig, StageKind, Task};

use crate::command::tool_key;

/// One stage as it would be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    pub kind: StageKind,
    pub max_attempts: u32,
    pub timeout_secs: Option<u64>,
    pub tool: Option<String>,

    /// Runs only after a PROMOTE decision.
    pub conditional: bool,
}

/// Stages, limits and tools for a task, computed without invoking anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub task: Task,
    pub steps: Vec<PlannedStage>,
    pub rebuild_before_ci_retry: bool,
    pub strict: bool,
}

impl PipelinePlan {
    pub fn build(task: &Task, config: &PipelineConfig) -> Self {
        let mut kinds = StageKind::GATED.to_vec();
        if config.docs_enabled {
            kinds.push(StageKind::Docs);
        }

        let steps = kinds
            .into_iter()
            .map(|kind| PlannedStage {
                kind,
                max_attempts: config.retry.max_attempts(kind),
                timeout_secs: config.timeouts.for_stage(kind).map(|d| d.as_secs()),
                tool: config.project.tools.get(tool_key(kind)).cloned(),
                conditional: kind.is_conditional(),
            })
            .collect();

        Self {
            task: task.clone(),
            steps,
            rebuild_before_ci_retry: config.retry.rebuild_before_ci_retry,
            strict: config.strict,
        }
    }
}

impl fmt::Display for PipelinePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan for {} ({})", self.task.id, self.task.description)?;
        for step in &self.steps {
            let timeout = step
                .timeout_secs
                .map_or_else(|| "none".to_string(), |s| format!("{s}s"));
            writeln!(
                f,
                "  {:<9} attempts={} timeout={:<6} tool={}{}",
                step.kind.label(),
                step.max_attempts,
                timeout,
                step.tool.as_deref().unwrap_or("-"),
                if step.conditional { "  (after PROMOTE)" } else { "" },
            )?;
        }
        if self.rebuild_before_ci_retry {
            writeln!(f, "  CI failures rebuild before retrying")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lists_stages_in_order() {
        let config = PipelineConfig::default();
        let plan = PipelinePlan::build(&Task::new("x").with_id("t-plan"), &config);
        let kinds: Vec<StageKind> = plan.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::Build,
                StageKind::Ci,
                StageKind::Review,
                StageKind::Security,
                StageKind::Docs
            ]
        );
        assert_eq!(plan.steps[0].max_attempts, 3);
        assert_eq!(plan.steps[2].max_attempts, 1);
        assert_eq!(plan.steps[4].max_attempts, 1);
        assert!(plan.steps[4].conditional);
        assert_eq!(plan.steps[0].timeout_secs, Some(300));
    }

    #[test]
    fn test_plan_without_docs() {
        let config = PipelineConfig {
            docs_enabled: false,
            ..PipelineConfig::default()
        };
        let plan = PipelinePlan::build(&Task::new("x"), &config);
        assert_eq!(plan.steps.len(), 4);
        assert!(plan.to_string().contains("BUILD"));
    }
}
