//! Starter configurations per project kind.
//!
//! Used by `shipgate init --project-type <kind>`. Each template fills in tool
//! commands whose output the pipeline can measure, relative performance
//! metrics, and absolute quality and security metrics. Standards and retry
//! policy keep their defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::{MetricSpec, PipelineConfig, ProjectConfig, StageKind};
use crate::gate::{
    COMPLEXITY_METRIC, MAINTAINABILITY_METRIC, SECURITY_FINDINGS_METRIC,
    VULNERABLE_DEPENDENCIES_METRIC,
};

/// Project kinds with a built-in template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Rust,
    Python,
    TypeScript,
    Go,
}

impl ProjectKind {
    pub const ALL: [ProjectKind; 4] = [
        ProjectKind::Rust,
        ProjectKind::Python,
        ProjectKind::TypeScript,
        ProjectKind::Go,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Rust => "rust",
            ProjectKind::Python => "python",
            ProjectKind::TypeScript => "typescript",
            ProjectKind::Go => "go",
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown project type '{0}' (expected one of: rust, python, typescript, go)")]
pub struct UnknownProjectKind(pub String);

impl FromStr for ProjectKind {
    type Err = UnknownProjectKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(ProjectKind::Rust),
            "python" | "py" => Ok(ProjectKind::Python),
            "typescript" | "ts" | "node" => Ok(ProjectKind::TypeScript),
            "go" | "golang" => Ok(ProjectKind::Go),
            other => Err(UnknownProjectKind(other.to_string())),
        }
    }
}

fn tools(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn perf(name: &str, target: f64, cap: f64) -> MetricSpec {
    MetricSpec::relative(name, target, Some(cap)).in_category("performance")
}

fn measured(name: &str, target: f64, unit: &str, stage: StageKind, category: &str) -> MetricSpec {
    MetricSpec::absolute(name, target, unit)
        .from_stage(stage)
        .in_category(category)
}

/// Quality metrics REVIEW measures on the target files, plus security
/// metrics. `audits_dependencies` when the security tool reports vulnerable
/// dependencies.
fn quality_and_security(audits_dependencies: bool) -> Vec<MetricSpec> {
    let mut metrics = vec![
        measured(COMPLEXITY_METRIC, 10.0, "max", StageKind::Review, "quality"),
        measured(MAINTAINABILITY_METRIC, 70.0, "score", StageKind::Review, "quality"),
        measured(SECURITY_FINDINGS_METRIC, 0.0, "count", StageKind::Security, "security"),
    ];
    if audits_dependencies {
        metrics.push(measured(
            VULNERABLE_DEPENDENCIES_METRIC,
            0.0,
            "count",
            StageKind::Security,
            "security",
        ));
    }
    metrics
}

impl PipelineConfig {
    /// Starter configuration for `kind`, named `name`.
    pub fn template(kind: ProjectKind, name: impl Into<String>) -> Self {
        let (project_type, tool_cmds, mut metrics, audits_dependencies) = match kind {
            ProjectKind::Rust => (
                "application",
                tools(&[
                    ("build", "cargo build --release"),
                    ("test", "cargo llvm-cov --summary-only"),
                    ("lint", "cargo clippy -- -D warnings"),
                    ("format", "cargo fmt"),
                    ("security", "cargo audit"),
                    ("docs", "cargo doc --no-deps"),
                ]),
                vec![
                    perf("compile_time", -5.0, 20.0),
                    perf("binary_size", 0.0, 10.0),
                    perf("memory_usage", -10.0, 5.0),
                ],
                true,
            ),
            ProjectKind::Python => (
                "api",
                tools(&[
                    ("test", "pytest --cov=. tests/"),
                    ("lint", "ruff check ."),
                    ("format", "ruff format ."),
                    ("typecheck", "mypy ."),
                    ("security", "bandit -r . && safety check"),
                ]),
                vec![
                    perf("response_time", -5.0, 10.0),
                    perf("throughput", 5.0, -10.0),
                    perf("memory_usage", 0.0, 15.0),
                ],
                true,
            ),
            ProjectKind::TypeScript => (
                "node",
                tools(&[
                    ("build", "npm run build"),
                    ("test", "vitest --run --coverage"),
                    ("lint", "eslint . --max-warnings 0"),
                    ("format", "prettier --write ."),
                    ("typecheck", "tsc --noEmit"),
                    ("security", "npm audit"),
                ]),
                vec![
                    perf("response_time", -5.0, 10.0),
                    perf("memory_usage", 0.0, 15.0),
                    perf("bundle_size", 0.0, 5.0),
                ],
                true,
            ),
            ProjectKind::Go => (
                "service",
                tools(&[
                    ("build", "go build -o bin/ ./..."),
                    ("test", "go test -race -cover ./..."),
                    ("lint", "golangci-lint run"),
                    ("format", "gofmt -l ."),
                    ("security", "gosec ./..."),
                ]),
                vec![
                    perf("response_time", -5.0, 10.0),
                    perf("memory_usage", 0.0, 15.0),
                    perf("binary_size", 0.0, 10.0),
                ],
                false,
            ),
        };
        metrics.extend(quality_and_security(audits_dependencies));

        PipelineConfig {
            project: ProjectConfig {
                name: name.into(),
                language: kind.as_str().to_string(),
                project_type: project_type.to_string(),
                tools: tool_cmds,
            },
            metrics,
            ..PipelineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_validates() {
        for kind in ProjectKind::ALL {
            let config = PipelineConfig::template(kind, "demo");
            assert!(config.validate().is_ok(), "{kind} template is invalid");
            assert!(config.project.tools.contains_key("test"));
            assert_eq!(config.project.language, kind.as_str());
        }
    }

    #[test]
    fn test_templates_carry_absolute_quality_metrics() {
        for kind in ProjectKind::ALL {
            let config = PipelineConfig::template(kind, "demo");
            let complexity = config.metric(COMPLEXITY_METRIC).unwrap();
            assert!(complexity.absolute);
            assert_eq!(complexity.stage, Some(StageKind::Review));
            assert_eq!(complexity.direction(), crate::domain::Direction::LowerIsBetter);
            let mi = config.metric(MAINTAINABILITY_METRIC).unwrap();
            assert_eq!(mi.direction(), crate::domain::Direction::HigherIsBetter);
            assert!(config.metric(SECURITY_FINDINGS_METRIC).is_some());
        }
        let go = PipelineConfig::template(ProjectKind::Go, "svc");
        assert!(go.metric(VULNERABLE_DEPENDENCIES_METRIC).is_none());
        let rust = PipelineConfig::template(ProjectKind::Rust, "svc");
        assert!(rust.metric(VULNERABLE_DEPENDENCIES_METRIC).is_some());
    }

    #[test]
    fn test_parse_project_kind() {
        assert_eq!("Rust".parse::<ProjectKind>().unwrap(), ProjectKind::Rust);
        assert_eq!("ts".parse::<ProjectKind>().unwrap(), ProjectKind::TypeScript);
        let err = "cobol".parse::<ProjectKind>().unwrap_err();
        assert!(err.to_string().contains("cobol"));
    }

    #[test]
    fn test_python_throughput_is_higher_is_better() {
        let config = PipelineConfig::template(ProjectKind::Python, "api");
        let throughput = config.metric("throughput").unwrap();
        assert_eq!(
            throughput.direction(),
            crate::domain::Direction::HigherIsBetter
        );
    }
}
