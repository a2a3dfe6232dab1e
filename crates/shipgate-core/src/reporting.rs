//! Plain-text rendering of sealed run records.

use std::fmt::Write as _;

use crate::domain::{DocsOutcome, RunRecord, VerdictStatus};

fn status_mark(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Pass => "ok",
        VerdictStatus::Warn => "!!",
        VerdictStatus::Fail => "xx",
        VerdictStatus::Skip => "--",
    }
}

/// Render a human-readable report: stage table, verdicts, decision, docs advisory.
pub fn render_run_report(record: &RunRecord) -> String {
    let mut out = String::new();
    let task = record.task();

    let _ = writeln!(out, "Run {} for task {}", record.run_id(), task.id);
    let _ = writeln!(out, "  {}", task.description);
    if !task.targets.is_empty() {
        let targets: Vec<_> = task.targets.iter().map(|p| p.display().to_string()).collect();
        let _ = writeln!(out, "  targets: {}", targets.join(", "));
    }
    out.push('\n');

    out.push_str("Stages\n");
    for r in record.stages().iter() {
        let outcome = if r.timed_out {
            "TIMEOUT"
        } else if r.success {
            "OK"
        } else {
            "FAILED"
        };
        let _ = write!(
            out,
            "  {:<9} #{:<2} {:<8} {:>7}ms",
            r.kind.label(),
            r.attempt,
            outcome,
            r.duration_ms
        );
        if let Some(msg) = r.headline() {
            let _ = write!(out, "  {msg}");
        }
        out.push('\n');
    }
    if record.stages().is_empty() {
        out.push_str("  (none)\n");
    }
    out.push('\n');

    out.push_str("Gates\n");
    for v in record.verdicts() {
        let kind = if v.mandatory { "mandatory" } else { "advisory" };
        let _ = writeln!(
            out,
            "  [{}] {:<5} {:<24} {:<9} {}",
            status_mark(v.status),
            v.status,
            v.gate,
            kind,
            v.reason
        );
    }
    out.push('\n');

    let _ = write!(out, "Decision: {}", record.decision());
    if record.cancelled() {
        out.push_str(" (cancelled)");
    }
    out.push('\n');

    match record.docs() {
        DocsOutcome::NotRun => {}
        DocsOutcome::Succeeded => out.push_str("Docs: updated\n"),
        DocsOutcome::Failed { reason } => {
            let _ = writeln!(out, "Docs: failed (advisory): {reason}");
        }
    }

    let _ = writeln!(
        out,
        "Duration: {}ms  Config: {}",
        record.duration_ms(),
        short_digest(record.config_digest())
    );
    out
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Decision, GateVerdict, MetricMap, RunDraft, StageKind, StageResult, Task,
    };
    use chrono::Utc;

    fn sealed(decision: Decision, docs_ok: Option<bool>) -> RunRecord {
        let task = Task::new("add rate limiter")
            .with_id("t-report")
            .with_targets(["src/limiter.rs"]);
        let mut draft = RunDraft::new(task.clone(), "0123456789abcdef0123");
        draft.record_stage(StageResult {
            kind: StageKind::Build,
            task_id: task.id.clone(),
            success: false,
            messages: vec!["error[E0308]: mismatched types".to_string()],
            metrics: MetricMap::new(),
            duration_ms: 120,
            attempt: 1,
            timed_out: false,
            started_at: Utc::now(),
        });
        let mut decided = draft.decide(
            decision,
            vec![
                GateVerdict::pass("build", "build succeeded on attempt 2").mandatory(),
                GateVerdict::warn("response_time", "delta -2.0%"),
            ],
        );
        if let Some(ok) = docs_ok {
            decided.record_docs(StageResult {
                kind: StageKind::Docs,
                task_id: task.id.clone(),
                success: ok,
                messages: if ok { vec![] } else { vec!["timeout".to_string()] },
                metrics: MetricMap::new(),
                duration_ms: 3,
                attempt: 1,
                timed_out: !ok,
                started_at: Utc::now(),
            });
        }
        decided.seal()
    }

    #[test]
    fn test_report_sections() {
        let text = render_run_report(&sealed(Decision::Promote, Some(true)));
        assert!(text.contains("task t-report"));
        assert!(text.contains("targets: src/limiter.rs"));
        assert!(text.contains("BUILD"));
        assert!(text.contains("mismatched types"));
        assert!(text.contains("response_time"));
        assert!(text.contains("advisory"));
        assert!(text.contains("Decision: PROMOTE"));
        assert!(text.contains("Docs: updated"));
        assert!(text.contains("Config: 0123456789ab"));
    }

    #[test]
    fn test_report_docs_failure_is_advisory() {
        let text = render_run_report(&sealed(Decision::Promote, Some(false)));
        assert!(text.contains("Docs: failed (advisory): timeout"));
        assert!(text.contains("TIMEOUT"));
    }

    #[test]
    fn test_report_hold_has_no_docs_line() {
        let text = render_run_report(&sealed(Decision::Hold, None));
        assert!(text.contains("Decision: HOLD"));
        assert!(!text.contains("Docs:"));
    }
}
