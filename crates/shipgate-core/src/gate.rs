//! Gate aggregator.
//!
//! Combines the authoritative stage results of one run with the configured
//! standards and metrics into an ordered list of [`GateVerdict`]s and a
//! [`Decision`]. Verdict order is fixed: mandatory standards in stage order
//! (`build`, `test`, `coverage`, `review`, `security`), then metrics in
//! declaration order.
//!
//! A stage with no recorded result is a mandatory FAIL, never a SKIP, so a
//! short-circuited run always explains why it was held.

use serde::{Deserialize, Serialize};

use crate::domain::{
    Decision, GateVerdict, MetricSpec, PipelineConfig, RunView, StageKind, StageResult,
    VerdictStatus,
};
use crate::metric_eval;

/// Stage metric carrying the CI coverage percentage.
pub const COVERAGE_METRIC: &str = "coverage";
/// Stage metric carrying the longest function REVIEW found, in lines.
pub const FUNCTION_LINES_METRIC: &str = "max_function_lines";
/// Stage metric carrying the REVIEW pattern-violation count.
pub const PATTERN_VIOLATIONS_METRIC: &str = "pattern_violations";
/// Stage metric carrying the SECURITY high-severity finding count.
pub const HIGH_SEVERITY_METRIC: &str = "high_severity_findings";
/// Stage metric carrying the highest per-function cyclomatic complexity REVIEW found.
pub const COMPLEXITY_METRIC: &str = "cyclomatic_complexity";
/// Stage metric carrying the lowest per-file maintainability index REVIEW found.
pub const MAINTAINABILITY_METRIC: &str = "maintainability_index";
/// Stage metric carrying the total SECURITY finding count, any severity.
pub const SECURITY_FINDINGS_METRIC: &str = "security_findings";
/// Stage metric carrying the vulnerable dependencies SECURITY reported.
pub const VULNERABLE_DEPENDENCIES_METRIC: &str = "dependency_vulnerabilities";

/// Suffix of a stage metric that reports the baseline of another metric.
pub const BASELINE_SUFFIX: &str = ".baseline";

/// Prefix added to a non-blocking metric FAIL.
pub const DOWNGRADED_PREFIX: &str = "downgraded from FAIL: ";

/// Decision plus the verdicts that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub decision: Decision,
    pub verdicts: Vec<GateVerdict>,
}

impl GateOutcome {
    pub fn blocking(&self) -> impl Iterator<Item = &GateVerdict> {
        self.verdicts.iter().filter(|v| v.blocks())
    }

    pub fn count(&self, status: VerdictStatus) -> usize {
        self.verdicts.iter().filter(|v| v.status == status).count()
    }
}

/// Evaluate every gate for `run` under `config`.
pub fn aggregate(run: &impl RunView, config: &PipelineConfig) -> GateOutcome {
    let mut verdicts = Vec::new();

    verdicts.push(stage_success("build", StageKind::Build, run));
    verdicts.push(stage_success("test", StageKind::Ci, run));
    if let Some(min) = config.standards.min_coverage {
        verdicts.push(coverage(min, run));
    }
    verdicts.push(review(run, config));
    verdicts.push(security(run, config));

    let verdicts: Vec<GateVerdict> = verdicts
        .into_iter()
        .map(GateVerdict::mandatory)
        .chain(config.metrics.iter().map(|spec| metric(spec, run, config)))
        .collect();

    GateOutcome {
        decision: Decision::from_verdicts(&verdicts),
        verdicts,
    }
}

fn not_executed(gate: &str, kind: StageKind, run: &impl RunView) -> GateVerdict {
    let why = if run.is_cancelled() {
        "cancelled"
    } else {
        "short-circuited"
    };
    GateVerdict::fail(gate, format!("{} not executed ({why})", kind.name()))
}

fn failure_reason(result: &StageResult) -> String {
    let what = if result.timed_out { "timed out" } else { "failed" };
    match result.headline() {
        Some(msg) => format!(
            "{} {what} on attempt {}: {msg}",
            result.kind.name(),
            result.attempt
        ),
        None => format!("{} {what} on attempt {}", result.kind.name(), result.attempt),
    }
}

fn stage_success(gate: &str, kind: StageKind, run: &impl RunView) -> GateVerdict {
    match run.history().latest(kind) {
        None => not_executed(gate, kind, run),
        Some(r) if r.success => GateVerdict::pass(
            gate,
            format!("{} succeeded on attempt {}", kind.name(), r.attempt),
        ),
        Some(r) => GateVerdict::fail(gate, failure_reason(r)),
    }
}

fn coverage(min: f64, run: &impl RunView) -> GateVerdict {
    let Some(ci) = run.history().latest(StageKind::Ci) else {
        return not_executed(COVERAGE_METRIC, StageKind::Ci, run);
    };
    match ci.metric(COVERAGE_METRIC) {
        None => GateVerdict::fail(COVERAGE_METRIC, "coverage not reported"),
        Some(measured) => {
            let spec = MetricSpec::absolute(COVERAGE_METRIC, min, "%");
            metric_eval::evaluate(&spec, measured, None)
        }
    }
}

/// Appends a limit violation when `metric` is reported above `limit`.
fn check_limit(problems: &mut Vec<String>, result: &StageResult, metric: &str, limit: f64) {
    if let Some(value) = result.metric(metric) {
        if !value.is_finite() {
            problems.push(format!("{metric} is not a finite number"));
        } else if value > limit {
            problems.push(format!("{metric} {value} exceeds {limit}"));
        }
    }
}

fn review(run: &impl RunView, config: &PipelineConfig) -> GateVerdict {
    let Some(result) = run.history().latest(StageKind::Review) else {
        return not_executed("review", StageKind::Review, run);
    };

    let mut problems = Vec::new();
    if !result.success {
        problems.push(failure_reason(result));
    }
    if let Some(limit) = config.standards.max_function_lines {
        check_limit(&mut problems, result, FUNCTION_LINES_METRIC, f64::from(limit));
    }
    check_limit(
        &mut problems,
        result,
        PATTERN_VIOLATIONS_METRIC,
        f64::from(config.standards.max_pattern_violations),
    );

    if problems.is_empty() {
        GateVerdict::pass("review", "review constraints satisfied")
    } else {
        GateVerdict::fail("review", problems.join("; "))
    }
}

fn security(run: &impl RunView, config: &PipelineConfig) -> GateVerdict {
    let Some(result) = run.history().latest(StageKind::Security) else {
        return not_executed("security", StageKind::Security, run);
    };

    let mut problems = Vec::new();
    if !result.success {
        problems.push(failure_reason(result));
    }
    check_limit(
        &mut problems,
        result,
        HIGH_SEVERITY_METRIC,
        f64::from(config.standards.max_high_severity),
    );

    if problems.is_empty() {
        GateVerdict::pass("security", "no blocking findings")
    } else {
        GateVerdict::fail("security", problems.join("; "))
    }
}

/// The authoritative result that carries `spec`'s measurement, if any.
fn measuring_stage<'a>(spec: &MetricSpec, run: &'a impl RunView) -> Option<&'a StageResult> {
    let history = run.history();
    match spec.stage {
        Some(kind) => history
            .latest(kind)
            .filter(|r| r.metrics.contains_key(&spec.name)),
        None => StageKind::GATED
            .iter()
            .filter_map(|kind| history.latest(*kind))
            .find(|r| r.metrics.contains_key(&spec.name)),
    }
}

fn metric(spec: &MetricSpec, run: &impl RunView, config: &PipelineConfig) -> GateVerdict {
    let Some(result) = measuring_stage(spec, run) else {
        let verdict = GateVerdict::skip(&spec.name, "not measured");
        return if config.strict {
            verdict.mandatory()
        } else {
            verdict
        };
    };

    let measured = result.metric(&spec.name).unwrap_or(f64::NAN);
    let baseline = result
        .metric(&format!("{}{BASELINE_SUFFIX}", spec.name))
        .or_else(|| config.baselines.get(&spec.name).copied());

    let verdict = metric_eval::evaluate(spec, measured, baseline);
    if config.strict {
        verdict.mandatory()
    } else if verdict.status == VerdictStatus::Fail {
        GateVerdict::warn(
            verdict.gate,
            format!("{DOWNGRADED_PREFIX}{}", verdict.reason),
        )
    } else {
        verdict
    }
}
