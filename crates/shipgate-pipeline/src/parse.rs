//! Measurement extraction from tool output.
//!
//! Heuristic, line-oriented parsers. Each returns what it can find and never
//! fails; a missing measurement simply leaves the metric unreported.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use shipgate_core::MetricMap;

// istanbul/vitest text table: `All files |   85.2 | ...`
static ISTANBUL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*All files\s*\|\s*(\d+(?:\.\d+)?)").unwrap());

// pytest-cov and cargo-llvm-cov summary row
static TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TOTAL.*?(\d+(?:\.\d+)?)%").unwrap());

// one per package with `go test -cover`
static PACKAGE_COVERAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)coverage:\s*(\d+(?:\.\d+)?)%").unwrap());

static TRAILING_COVERAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)%\s*coverage").unwrap());

static BENCH_ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_][\w.-]*):([+-]?\d+(?:\.\d+)?)%").unwrap());

static BENCH_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w.-]*$").unwrap());

static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| diagnostic_re("error"));

static WARNING_RE: LazyLock<Regex> = LazyLock::new(|| diagnostic_re("warning"));

static SEVERITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:severity|risk)\W*(critical|high|moderate|medium|low)\b").unwrap()
});

static VULNERABILITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s+(?:known\s+)?vulnerabilit(?:y|ies)\b").unwrap()
});

static NO_VULNERABILITIES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bno\s+(?:known\s+)?(?:security\s+)?vulnerabilities\b").unwrap()
});

static FUNCTION_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|def|func|function)\s+\w+").unwrap()
});

static DECISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|elif|else|for|while|loop|match|case|catch|except|switch)\b|&&|\|\|")
        .unwrap()
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").unwrap());

static SECURITY_PATTERNS: LazyLock<Vec<(&'static str, Severity, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "hardcoded_secret",
            Severity::Medium,
            Regex::new(r#"(?i)(?:password|passwd|secret|key|token)\w*\s*(?::[^=\n]*)?=\s*["'][^"'\n]+["']"#)
                .unwrap(),
        ),
        (
            "sql_injection",
            Severity::High,
            Regex::new(r"(?i)\b(?:SELECT|INSERT|UPDATE|DELETE)\b.*\+").unwrap(),
        ),
        (
            "command_injection",
            Severity::High,
            Regex::new(r"(?i)\b(?:exec|eval|system)\s*\(").unwrap(),
        ),
        (
            "path_traversal",
            Severity::Medium,
            Regex::new(r"\.\./|\.\.\\").unwrap(),
        ),
    ]
});

/// Compiler and linter diagnostics at `level`: `error:`, `error[E0308]:`,
/// `file:3:5: error`, `file.ts(3,5): error`, and eslint's `3:5  error`.
fn diagnostic_re(level: &str) -> Regex {
    let pattern = format!(
        r"(?i)^\s*{level}(?:\[\w+\])?:|:\d+(?::\d+)?:\s*{level}\b|\)\s*:\s*{level}\b|^\s*\d+:\d+\s+{level}\s"
    );
    Regex::new(&pattern).unwrap()
}

fn first_capture(re: &Regex, output: &str) -> Option<f64> {
    re.captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Coverage percentage.
///
/// A whole-project total wins: the istanbul `All files` row, then a `TOTAL`
/// row. Per-package `coverage: N%` lines are averaged.
pub fn coverage(output: &str) -> Option<f64> {
    first_capture(&ISTANBUL_RE, output)
        .or_else(|| first_capture(&TOTAL_RE, output))
        .or_else(|| {
            let packages: Vec<f64> = PACKAGE_COVERAGE_RE
                .captures_iter(output)
                .filter_map(|c| c[1].parse().ok())
                .collect();
            (!packages.is_empty()).then(|| packages.iter().sum::<f64>() / packages.len() as f64)
        })
        .or_else(|| first_capture(&TRAILING_COVERAGE_RE, output))
}

/// Counts of error and warning diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LintCounts {
    pub errors: u32,
    pub warnings: u32,
}

pub fn lint_counts(output: &str) -> LintCounts {
    let mut counts = LintCounts::default();
    for line in output.lines() {
        if ERROR_RE.is_match(line) {
            counts.errors += 1;
        } else if WARNING_RE.is_match(line) {
            counts.warnings += 1;
        }
    }
    counts
}

/// Counts of severity-tagged security findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

pub fn severity_counts(output: &str) -> SeverityCounts {
    let mut counts = SeverityCounts::default();
    for caps in output.lines().filter_map(|l| SEVERITY_RE.captures(l)) {
        match caps[1].to_ascii_lowercase().as_str() {
            "critical" | "high" => counts.high += 1,
            "moderate" | "medium" => counts.medium += 1,
            _ => counts.low += 1,
        }
    }
    counts
}

/// Vulnerable dependencies reported by an audit tool, e.g. `found 3
/// vulnerabilities` or `No known security vulnerabilities found`.
pub fn dependency_vulnerabilities(output: &str) -> Option<u32> {
    let counted = VULNERABILITY_RE
        .captures_iter(output)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max();
    counted.or_else(|| NO_VULNERABILITIES_RE.is_match(output).then_some(0))
}

/// Whether `name` can be written to and read back from a `BENCH:` line.
pub fn is_bench_name(name: &str) -> bool {
    BENCH_NAME_RE.is_match(name)
}

/// Metrics from `BENCH: name:+x.x% ...` lines.
///
/// Each entry yields `name = 100 + delta` and `name.baseline = 100`, so the
/// relative evaluator recovers exactly the reported delta.
pub fn bench_metrics(output: &str) -> MetricMap {
    let mut metrics = MetricMap::new();
    for line in output.lines() {
        let Some(body) = line.trim().strip_prefix("BENCH:") else {
            continue;
        };
        for caps in BENCH_ENTRY_RE.captures_iter(body) {
            let (Some(name), Some(delta)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if let Ok(delta) = delta.as_str().parse::<f64>() {
                metrics.insert(name.as_str().to_string(), 100.0 + delta);
                metrics.insert(format!("{}.baseline", name.as_str()), 100.0);
            }
        }
    }
    metrics
}

/// Function bodies in `lines`. A function runs from its declaration line to
/// the next declaration or the end of the file, minus trailing blank lines.
fn functions<'a, 'b>(lines: &'b [&'a str]) -> Vec<&'b [&'a str]> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| FUNCTION_START_RE.is_match(l))
        .map(|(i, _)| i)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(lines.len());
            let body = &lines[start..end];
            let len = body
                .iter()
                .rposition(|l| !l.trim().is_empty())
                .map_or(1, |last| last + 1);
            &body[..len]
        })
        .collect()
}

fn is_comment(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("//") || line.starts_with("/*") || line.starts_with('*') || line.starts_with("# ")
}

fn decision_points(lines: &[&str]) -> u32 {
    lines
        .iter()
        .filter(|l| !is_comment(l))
        .map(|l| DECISION_RE.find_iter(l).count() as u32)
        .sum()
}

/// Length in lines of the longest function in `source`.
pub fn longest_function(source: &str) -> usize {
    let lines: Vec<&str> = source.lines().collect();
    functions(&lines).iter().map(|f| f.len()).max().unwrap_or(0)
}

/// Highest cyclomatic complexity of any function in `source`: one plus the
/// branch keywords and boolean operators in its body. Without recognisable
/// functions the whole file counts as one.
pub fn complexity(source: &str) -> u32 {
    let lines: Vec<&str> = source.lines().collect();
    let mut units = functions(&lines);
    if units.is_empty() {
        units.push(&lines[..]);
    }
    units
        .iter()
        .map(|unit| 1 + decision_points(unit))
        .max()
        .unwrap_or(1)
}

/// Maintainability index on a 0-100 scale, from Halstead volume, complexity
/// and code lines. `None` for files too small to measure.
pub fn maintainability_index(source: &str) -> Option<f64> {
    let code: Vec<&str> = source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_comment(l))
        .collect();
    let tokens: Vec<&str> = code
        .iter()
        .flat_map(|l| TOKEN_RE.find_iter(l).map(|m| m.as_str()))
        .collect();
    let distinct = tokens.iter().collect::<HashSet<_>>().len();
    if code.is_empty() || distinct < 2 {
        return None;
    }

    let volume = tokens.len() as f64 * (distinct as f64).log2();
    let branches = f64::from(1 + decision_points(&code));
    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * branches - 16.2 * (code.len() as f64).ln();
    let scaled = (raw * 100.0 / 171.0).clamp(0.0, 100.0);
    Some((scaled * 10.0).round() / 10.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
}

/// A risky construct found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFinding {
    pub kind: &'static str,
    pub severity: Severity,
    /// 1-based.
    pub line: usize,
}

/// Scan `source` for hardcoded secrets, SQL and command injection, and path
/// traversal. Injection is high severity, the rest medium.
pub fn security_patterns(source: &str) -> Vec<PatternFinding> {
    let mut findings = Vec::new();
    for (index, line) in source.lines().enumerate() {
        for (kind, severity, re) in SECURITY_PATTERNS.iter() {
            for _ in re.find_iter(line) {
                findings.push(PatternFinding {
                    kind: *kind,
                    severity: *severity,
                    line: index + 1,
                });
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_formats() {
        let pytest = "Name    Stmts   Miss  Cover\n---\nTOTAL     120     18    85%\n";
        assert_eq!(coverage(pytest), Some(85.0));
        assert_eq!(coverage("ok  coverage: 79.9% of statements"), Some(79.9));
        assert_eq!(coverage("91.25% coverage"), Some(91.25));
        assert_eq!(coverage("test result: ok. 12 passed"), None);
    }

    #[test]
    fn test_lint_counts() {
        let out = "src/a.rs:3: error: unused\nwarning: shadowed\nWARNING: long line\nclean\n";
        assert_eq!(
            lint_counts(out),
            LintCounts {
                errors: 1,
                warnings: 2
            }
        );
    }

    #[test]
    fn test_severity_counts() {
        let out = "\
>> Issue: [B602] Severity: High   Confidence: High
>> Issue: [B101] Severity: Low   Confidence: High
Crate: time  Risk: medium
high score but no tag
";
        assert_eq!(
            severity_counts(out),
            SeverityCounts {
                high: 1,
                medium: 1,
                low: 1
            }
        );
    }

    #[test]
    fn test_bench_metrics() {
        let m = bench_metrics("noise\nBENCH: response_time:-2.0% throughput:+5.5%\n");
        assert_eq!(m.get("response_time"), Some(&98.0));
        assert_eq!(m.get("response_time.baseline"), Some(&100.0));
        assert_eq!(m.get("throughput"), Some(&105.5));
    }

    #[test]
    fn test_longest_function() {
        let src = "\
fn short() {
    1
}

pub async fn longer() {
    a();
    b();
    c();
}


";
        assert_eq!(longest_function(src), 5);
        assert_eq!(longest_function("no functions here"), 0);
        let py = "def f():\n    return 1\n";
        assert_eq!(longest_function(py), 2);
    }

    #[test]
    fn test_lint_counts_diagnostics_only() {
        let clippy_clean = "    Checking thiserror v1.0.69\n    Checking demo v0.1.0 (/src/demo)\n    Finished `dev` profile [unoptimized + debuginfo] target(s) in 2.31s\n";
        assert_eq!(lint_counts(clippy_clean), LintCounts::default());

        let eslint_summary = "\n/src/app.ts\n  1:7  warning  'x' is assigned a value but never used  no-unused-vars\n\n✖ 3 problems (0 errors, 3 warnings)\n";
        assert_eq!(
            lint_counts(eslint_summary),
            LintCounts {
                errors: 0,
                warnings: 1
            }
        );

        let failing = "error[E0308]: mismatched types\n  --> src/main.rs:4:5\n  2:10  error  'y' is not defined  no-undef\nsrc/a.ts(3,7): error TS2322: bad\n";
        assert_eq!(lint_counts(failing).errors, 3);
    }

    #[test]
    fn test_coverage_tables_and_packages() {
        let vitest = " % Coverage report from v8\n-----------|---------|----------|\nFile       | % Stmts | % Branch |\n-----------|---------|----------|\nAll files  |    85.2 |     70.1 |\n app.ts    |    85.2 |     70.1 |\n";
        assert_eq!(coverage(vitest), Some(85.2));

        let llvm_cov = "Filename  Regions  Missed Regions  Cover\nTOTAL  120  18  85.00%  20  2  90.00%\n";
        assert_eq!(coverage(llvm_cov), Some(85.0));

        let go = "ok  \texample.com/svc/api\t0.1s\tcoverage: 80.0% of statements\nok  \texample.com/svc/store\t0.3s\tcoverage: 90.0% of statements\n";
        assert_eq!(coverage(go), Some(85.0));
    }

    #[test]
    fn test_complexity_takes_worst_function() {
        let src = "\
fn simple() {
    run();
}

fn branchy(x: i32) {
    // if this were code it would count
    if x > 0 && x < 10 {
        a();
    } else if x == 0 {
        b();
    }
    for i in 0..x {
        c(i);
    }
}
";
        assert_eq!(complexity(src), 6);
        assert_eq!(complexity("run();\nstop();\n"), 1);
        assert_eq!(complexity("fn decide_if() {\n    go();\n}\n"), 1);
    }

    #[test]
    fn test_maintainability_index() {
        let simple = "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n";
        let branchy = "\
fn classify(x: i32, y: i32) -> i32 {
    if x > 0 && y > 0 {
        if x > y { return x - y; } else { return y - x; }
    } else if x < 0 || y < 0 {
        for i in 0..10 { if i == x { return i; } }
        while x > y { return 0; }
    }
    match x { 0 => 1, _ => 2 }
}
";
        let a = maintainability_index(simple).unwrap();
        let b = maintainability_index(branchy).unwrap();
        assert!((0.0..=100.0).contains(&a));
        assert!((0.0..=100.0).contains(&b));
        assert!(a > b);
        assert_eq!(maintainability_index("\n\n"), None);
    }

    #[test]
    fn test_security_patterns() {
        let src = "\
let password = \"hunter2\";
let q = \"SELECT * FROM users WHERE id = \" + id;
os.system(cmd)
open(\"../etc/passwd\")
const API_KEY: &str = \"abc123\";
let total = a + b;
";
        let found: Vec<(&str, Severity, usize)> = security_patterns(src)
            .into_iter()
            .map(|f| (f.kind, f.severity, f.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("hardcoded_secret", Severity::Medium, 1),
                ("sql_injection", Severity::High, 2),
                ("command_injection", Severity::High, 3),
                ("path_traversal", Severity::Medium, 4),
                ("hardcoded_secret", Severity::Medium, 5),
            ]
        );
    }

    #[test]
    fn test_dependency_vulnerabilities() {
        assert_eq!(dependency_vulnerabilities("found 0 vulnerabilities"), Some(0));
        assert_eq!(
            dependency_vulnerabilities("error: 2 vulnerabilities found!"),
            Some(2)
        );
        assert_eq!(
            dependency_vulnerabilities("3 vulnerabilities (1 low, 2 high)"),
            Some(3)
        );
        assert_eq!(
            dependency_vulnerabilities("No known security vulnerabilities found."),
            Some(0)
        );
        assert_eq!(dependency_vulnerabilities("Issues : 0"), None);
    }

    #[test]
    fn test_bench_names() {
        assert!(is_bench_name("response_time"));
        assert!(is_bench_name("p99.latency-ms"));
        assert!(!is_bench_name("foo:bar"));
        assert!(!is_bench_name("two words"));
        assert!(!is_bench_name(""));
        assert!(!is_bench_name("9lives"));
    }
}
