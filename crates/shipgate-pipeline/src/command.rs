//! Shell-command tool invoker.
//!
//! Maps each stage to a configured tool command and runs it through `sh -c`
//! in the project directory. Measurements are parsed out of the combined
//! output according to the stage. REVIEW and SECURITY also read the task's
//! target files for function length, complexity and risky patterns.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use shipgate_core::gate::{
    COMPLEXITY_METRIC, COVERAGE_METRIC, FUNCTION_LINES_METRIC, HIGH_SEVERITY_METRIC,
    MAINTAINABILITY_METRIC, PATTERN_VIOLATIONS_METRIC, SECURITY_FINDINGS_METRIC,
    VULNERABLE_DEPENDENCIES_METRIC,
};
use shipgate_core::{ProjectConfig, StageKind, Task};

use crate::invoker::{ToolInvoker, ToolOutput};
use crate::parse::{self, Severity};

/// Diagnostic lines kept from a failing command's output.
const MAX_DIAGNOSTIC_LINES: usize = 20;

/// Key in `project.tools` used for each stage.
pub fn tool_key(kind: StageKind) -> &'static str {
    match kind {
        StageKind::Build => "build",
        StageKind::Ci => "test",
        StageKind::Review => "lint",
        StageKind::Security => "security",
        StageKind::Docs => "docs",
    }
}

/// Runs configured tool commands as child processes.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    workdir: PathBuf,
}

impl CommandInvoker {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Check that a tool command's program is installed by running
    /// `<program> --version`. Returns the first line it prints.
    pub async fn probe(&self, command: &str) -> anyhow::Result<String> {
        let program = command
            .split_whitespace()
            .next()
            .context("empty tool command")?;
        let output = Command::new(program)
            .arg("--version")
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("`{program}` is not runnable"))?;
        if !output.status.success() {
            anyhow::bail!("`{program} --version` exited with {}", output.status);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Contents of the task's readable target files, keyed by display path.
    async fn read_targets(&self, task: &Task) -> Vec<(String, String)> {
        let mut sources = Vec::new();
        for target in &task.targets {
            let path = self.workdir.join(target);
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => sources.push((target.display().to_string(), source)),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable target"),
            }
        }
        sources
    }

    /// Run `command` through the shell. Returns the result and the combined
    /// stdout and stderr.
    async fn execute(
        &self,
        kind: StageKind,
        task: &Task,
        command: &str,
    ) -> anyhow::Result<(ToolOutput, String)> {
        let start = Instant::now();
        let targets: Vec<String> = task
            .targets
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        debug!(stage = %kind, command = %command, "spawning tool");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .env("SHIPGATE_TASK_ID", task.id.as_str())
            .env("SHIPGATE_STAGE", kind.name())
            .env("SHIPGATE_TARGETS", targets.join(" "))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn `{command}` for {kind}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}\n{stderr}");

        let mut result = ToolOutput {
            success: output.status.success(),
            duration_ms: start.elapsed().as_millis() as u64,
            metrics: parse::bench_metrics(&combined),
            ..ToolOutput::default()
        };

        if result.success {
            result.messages.push(format!("`{command}` succeeded"));
        } else {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            result
                .messages
                .push(format!("`{command}` exited with status {code}"));
            result.messages.extend(tail(&stderr, MAX_DIAGNOSTIC_LINES));
            result.messages.extend(tail(&stdout, MAX_DIAGNOSTIC_LINES));
        }
        Ok((result, combined))
    }
}

fn tail(text: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(n);
    lines[skip..].iter().map(|l| l.to_string()).collect()
}

fn set(result: &mut ToolOutput, name: &str, value: f64) {
    result.metrics.insert(name.to_string(), value);
}

/// Lint counts from tool output; function length, complexity and
/// maintainability from the target sources.
fn measure_review(result: &mut ToolOutput, output: Option<&str>, sources: &[(String, String)]) {
    if let Some(output) = output {
        let lint = parse::lint_counts(output);
        set(result, PATTERN_VIOLATIONS_METRIC, f64::from(lint.errors));
        set(result, "lint_warnings", f64::from(lint.warnings));
    }
    if sources.is_empty() {
        return;
    }

    let longest = sources
        .iter()
        .map(|(_, src)| parse::longest_function(src))
        .max()
        .unwrap_or(0);
    set(result, FUNCTION_LINES_METRIC, longest as f64);

    let complexity = sources
        .iter()
        .map(|(_, src)| parse::complexity(src))
        .max()
        .unwrap_or(1);
    set(result, COMPLEXITY_METRIC, f64::from(complexity));

    let maintainability = sources
        .iter()
        .filter_map(|(_, src)| parse::maintainability_index(src))
        .reduce(f64::min);
    if let Some(mi) = maintainability {
        set(result, MAINTAINABILITY_METRIC, mi);
    }
}

/// Severity counts from tool output plus a pattern scan of the target sources.
fn measure_security(result: &mut ToolOutput, output: Option<&str>, sources: &[(String, String)]) {
    if output.is_none() && sources.is_empty() {
        return;
    }

    let mut sev = output.map(parse::severity_counts).unwrap_or_default();
    for (path, src) in sources {
        for finding in parse::security_patterns(src) {
            let label = match finding.severity {
                Severity::High => {
                    sev.high += 1;
                    "high"
                }
                Severity::Medium => {
                    sev.medium += 1;
                    "medium"
                }
            };
            result
                .messages
                .push(format!("{path}:{}: {} ({label})", finding.line, finding.kind));
        }
    }

    set(result, HIGH_SEVERITY_METRIC, f64::from(sev.high));
    set(result, "medium_severity_findings", f64::from(sev.medium));
    set(result, "low_severity_findings", f64::from(sev.low));
    set(
        result,
        SECURITY_FINDINGS_METRIC,
        f64::from(sev.high + sev.medium + sev.low),
    );
    if let Some(n) = output.and_then(parse::dependency_vulnerabilities) {
        set(result, VULNERABLE_DEPENDENCIES_METRIC, f64::from(n));
    }
}

#[async_trait]
impl ToolInvoker for CommandInvoker {
    async fn invoke(
        &self,
        kind: StageKind,
        task: &Task,
        project: &ProjectConfig,
    ) -> anyhow::Result<ToolOutput> {
        let key = tool_key(kind);
        let (mut result, output) = match project.tools.get(key).filter(|c| !c.trim().is_empty()) {
            Some(command) => {
                let (result, combined) = self.execute(kind, task, command).await?;
                (result, Some(combined))
            }
            None => (
                ToolOutput::succeeded().with_message(format!("no tool configured for {key}")),
                None,
            ),
        };

        match kind {
            StageKind::Ci => {
                if let Some(c) = output.as_deref().and_then(parse::coverage) {
                    set(&mut result, COVERAGE_METRIC, c);
                }
            }
            StageKind::Review => {
                let sources = self.read_targets(task).await;
                measure_review(&mut result, output.as_deref(), &sources);
            }
            StageKind::Security => {
                let sources = self.read_targets(task).await;
                measure_security(&mut result, output.as_deref(), &sources);
            }
            StageKind::Build | StageKind::Docs => {}
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(tools: &[(&str, &str)]) -> ProjectConfig {
        ProjectConfig {
            name: "demo".to_string(),
            tools: tools
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..ProjectConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_tool_succeeds_with_note() {
        let invoker = CommandInvoker::new(".");
        let out = invoker
            .invoke(StageKind::Docs, &Task::new("docs"), &project(&[]))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.messages, vec!["no tool configured for docs".to_string()]);
    }

    #[tokio::test]
    async fn test_coverage_parsed_for_ci() {
        let invoker = CommandInvoker::new(".");
        let out = invoker
            .invoke(
                StageKind::Ci,
                &Task::new("tests"),
                &project(&[("test", "echo 'TOTAL 40 4 90%'")]),
            )
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.metrics.get(COVERAGE_METRIC), Some(&90.0));
    }

    #[tokio::test]
    async fn test_failing_command_reports_status_and_output() {
        let invoker = CommandInvoker::new(".");
        let out = invoker
            .invoke(
                StageKind::Build,
                &Task::new("build"),
                &project(&[("build", "echo 'error: boom' >&2; exit 3")]),
            )
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.messages[0].contains("status 3"));
        assert!(out.messages.iter().any(|m| m == "error: boom"));
    }

    #[tokio::test]
    async fn test_review_measures_target_functions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "fn a() {\n    1;\n    2;\n}\n",
        )
        .unwrap();
        let invoker = CommandInvoker::new(dir.path());
        let task = Task::new("review").with_targets(["lib.rs", "missing.rs"]);
        let out = invoker
            .invoke(StageKind::Review, &task, &project(&[("lint", "echo 'warning: x'")]))
            .await
            .unwrap();
        assert_eq!(out.metrics.get(FUNCTION_LINES_METRIC), Some(&4.0));
        assert_eq!(out.metrics.get(PATTERN_VIOLATIONS_METRIC), Some(&0.0));
        assert_eq!(out.metrics.get("lint_warnings"), Some(&1.0));
    }

    #[tokio::test]
    async fn test_security_counts_high_findings() {
        let invoker = CommandInvoker::new(".");
        let out = invoker
            .invoke(
                StageKind::Security,
                &Task::new("scan"),
                &project(&[("security", "echo 'Severity: High'; echo 'Severity: Low'")]),
            )
            .await
            .unwrap();
        assert_eq!(out.metrics.get(HIGH_SEVERITY_METRIC), Some(&1.0));
    }

    #[tokio::test]
    async fn test_security_scans_targets_without_tool() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "import os\nos.system(cmd)\npassword = \"hunter2\"\n",
        )
        .unwrap();
        let invoker = CommandInvoker::new(dir.path());
        let task = Task::new("scan").with_targets(["app.py"]);
        let out = invoker
            .invoke(StageKind::Security, &task, &project(&[]))
            .await
            .unwrap();

        assert!(out.success);
        assert_eq!(out.metrics.get(HIGH_SEVERITY_METRIC), Some(&1.0));
        assert_eq!(out.metrics.get("medium_severity_findings"), Some(&1.0));
        assert_eq!(out.metrics.get(SECURITY_FINDINGS_METRIC), Some(&2.0));
        assert!(out.messages.iter().any(|m| m == "app.py:2: command_injection (high)"));
        assert!(out.messages.iter().any(|m| m == "app.py:3: hardcoded_secret (medium)"));
    }

    #[tokio::test]
    async fn test_security_reads_vulnerability_count() {
        let invoker = CommandInvoker::new(".");
        let out = invoker
            .invoke(
                StageKind::Security,
                &Task::new("audit"),
                &project(&[("security", "echo 'found 2 vulnerabilities'")]),
            )
            .await
            .unwrap();
        assert_eq!(out.metrics.get(VULNERABLE_DEPENDENCIES_METRIC), Some(&2.0));
        assert_eq!(out.metrics.get(HIGH_SEVERITY_METRIC), Some(&0.0));
    }

    #[tokio::test]
    async fn test_review_measures_complexity_and_maintainability() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "fn pick(x: i32) -> i32 {\n    if x > 0 { 1 } else { 2 }\n}\n",
        )
        .unwrap();
        let invoker = CommandInvoker::new(dir.path());
        let task = Task::new("review").with_targets(["lib.rs"]);
        let out = invoker
            .invoke(StageKind::Review, &task, &project(&[]))
            .await
            .unwrap();

        assert_eq!(out.metrics.get(COMPLEXITY_METRIC), Some(&3.0));
        let mi = out.metrics.get(MAINTAINABILITY_METRIC).copied().unwrap();
        assert!((0.0..=100.0).contains(&mi));
        assert_eq!(out.metrics.get(PATTERN_VIOLATIONS_METRIC), None);
    }

    #[tokio::test]
    async fn test_probe_reports_missing_program() {
        let invoker = CommandInvoker::new(".");
        assert!(invoker
            .probe("definitely-not-a-shipgate-tool --flag")
            .await
            .is_err());
        assert!(invoker.probe("   ").await.is_err());
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        let text = "a\n\nb\nc\n";
        assert_eq!(tail(text, 2), vec!["b".to_string(), "c".to_string()]);
    }
}
