//! Structured pipeline configuration.
//!
//! The core never reads files; callers deserialize a [`PipelineConfig`] and
//! hand it over. [`PipelineConfig::validate`] must pass before a run starts.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::{ConfigError, InvalidConfig, Result};
use super::metric::{Direction, MetricSpec};
use super::stage::StageKind;

/// Project identity and the tool command configured for each tool key
/// (`build`, `test`, `lint`, `security`, `docs`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,

    #[serde(default)]
    pub language: String,

    #[serde(default)]
    pub project_type: String,

    #[serde(default)]
    pub tools: BTreeMap<String, String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "project".to_string(),
            language: String::new(),
            project_type: String::new(),
            tools: BTreeMap::new(),
        }
    }
}

/// Bounded re-execution policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts allowed after the first one.
    pub retry_cap: u32,

    /// Stages eligible for retry.
    pub retryable: Vec<StageKind>,

    /// Route a failed CI attempt back through BUILD. BUILD and CI retries then
    /// share one budget of `retry_cap`.
    pub rebuild_before_ci_retry: bool,

    /// Pause between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_cap: 2,
            retryable: vec![StageKind::Build, StageKind::Ci],
            rebuild_before_ci_retry: false,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, kind: StageKind) -> bool {
        kind != StageKind::Docs && self.retryable.contains(&kind)
    }

    /// Retries allowed for `kind`.
    pub fn retries_for(&self, kind: StageKind) -> u32 {
        if self.is_retryable(kind) {
            self.retry_cap
        } else {
            0
        }
    }

    /// Upper bound on recorded attempts for `kind`.
    pub fn max_attempts(&self, kind: StageKind) -> u32 {
        self.retries_for(kind).saturating_add(1)
    }
}

/// Per-stage timeouts in seconds. Zero disables the timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    pub default_secs: u64,
    pub stages: BTreeMap<StageKind, u64>,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            default_secs: 300,
            stages: BTreeMap::new(),
        }
    }
}

impl TimeoutPolicy {
    pub fn for_stage(&self, kind: StageKind) -> Option<Duration> {
        let secs = self.stages.get(&kind).copied().unwrap_or(self.default_secs);
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

/// Thresholds for the mandatory standards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Standards {
    /// Minimum CI `coverage` percentage. No coverage gate when `None`.
    pub min_coverage: Option<f64>,

    /// Longest function REVIEW may report via `max_function_lines`.
    pub max_function_lines: Option<u32>,

    /// Allowed SECURITY `high_severity_findings`.
    pub max_high_severity: u32,

    /// Allowed REVIEW `pattern_violations`.
    pub max_pattern_violations: u32,
}

impl Default for Standards {
    fn default() -> Self {
        Self {
            min_coverage: Some(80.0),
            max_function_lines: Some(30),
            max_high_severity: 0,
            max_pattern_violations: 0,
        }
    }
}

/// Complete, read-only configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub timeouts: TimeoutPolicy,

    #[serde(default)]
    pub standards: Standards,

    /// Metric policies, in declaration order.
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,

    /// Baseline values for relative metrics, keyed by metric name.
    #[serde(default)]
    pub baselines: BTreeMap<String, f64>,

    /// Treat metric FAILs as blocking.
    #[serde(default)]
    pub strict: bool,

    #[serde(default = "default_true")]
    pub docs_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            retry: RetryPolicy::default(),
            timeouts: TimeoutPolicy::default(),
            standards: Standards::default(),
            metrics: Vec::new(),
            baselines: BTreeMap::new(),
            strict: false,
            docs_enabled: true,
        }
    }
}

impl PipelineConfig {
    pub fn metric(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Collect every configuration problem.
    pub fn issues(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if self.project.name.trim().is_empty() {
            issues.push(ConfigError::EmptyProjectName);
        }

        if let Some(min) = self.standards.min_coverage {
            if !(0.0..=100.0).contains(&min) {
                issues.push(ConfigError::CoverageOutOfRange { value: min });
            }
        }

        if self.retry.retryable.contains(&StageKind::Docs) {
            issues.push(ConfigError::NotRetryable {
                stage: StageKind::Docs,
            });
        }

        let mut seen = HashSet::new();
        for (index, spec) in self.metrics.iter().enumerate() {
            if spec.name.trim().is_empty() {
                issues.push(ConfigError::EmptyMetricName { index });
                continue;
            }
            if !seen.insert(spec.name.as_str()) {
                issues.push(ConfigError::DuplicateMetric {
                    name: spec.name.clone(),
                });
            }
            issues.extend(metric_issues(spec));
        }

        for (name, value) in &self.baselines {
            if !value.is_finite() {
                issues.push(ConfigError::NonFiniteBaseline { name: name.clone() });
            }
        }

        issues
    }

    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(InvalidConfig(issues))
        }
    }

    /// SHA-256 hex digest of the canonical JSON form.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

fn metric_issues(spec: &MetricSpec) -> Vec<ConfigError> {
    let mut issues = Vec::new();
    if !spec.target.is_finite() {
        issues.push(ConfigError::NonFinite {
            name: spec.name.clone(),
            field: "target",
        });
    }
    if let Some(stage) = spec.stage.filter(|s| !StageKind::GATED.contains(s)) {
        issues.push(ConfigError::StageAfterDecision {
            name: spec.name.clone(),
            stage,
        });
    }
    let Some(cap) = spec.cap else {
        return issues;
    };
    if !cap.is_finite() {
        issues.push(ConfigError::NonFinite {
            name: spec.name.clone(),
            field: "cap",
        });
        return issues;
    }

    // A cap must tolerate more than the target does, or the policy can never WARN.
    let inverted = match (spec.absolute, spec.direction()) {
        (false, Direction::LowerIsBetter) => cap < spec.target,
        (false, Direction::HigherIsBetter) => cap > spec.target,
        (true, Direction::HigherIsBetter) => cap < spec.target,
        (true, Direction::LowerIsBetter) => false,
    };
    if inverted {
        issues.push(ConfigError::CapInsideTarget {
            name: spec.name.clone(),
            target: spec.target,
            cap,
        });
    }
    issues
}
