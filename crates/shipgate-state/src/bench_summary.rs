//! Benchmark summary file (`ci/BENCH_SUMMARY.txt`).
//!
//! A single line of the form `BENCH: name:+x.x% other:-y.y%`. Entries keep
//! their first-seen order; recording an existing name replaces its value.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

/// Default location relative to the project root.
pub const DEFAULT_BENCH_PATH: &str = "ci/BENCH_SUMMARY.txt";

const PREFIX: &str = "BENCH:";

/// Ordered `name -> formatted delta` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchSummary {
    entries: Vec<(String, String)>,
}

impl BenchSummary {
    /// Parse the summary line. Tokens without a `:` are ignored.
    pub fn parse(content: &str) -> Self {
        let body = content.trim();
        let body = body.strip_prefix(PREFIX).unwrap_or(body);
        let mut summary = BenchSummary::default();
        for token in body.split_whitespace() {
            if let Some((name, value)) = token.split_once(':') {
                summary.set_raw(name, value);
            }
        }
        summary
    }

    fn set_raw(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Record `delta` percent for `name`, formatted with sign and one decimal.
    pub fn record(&mut self, name: &str, delta: f64) -> String {
        let formatted = format!("{delta:+.1}%");
        self.set_raw(name, &formatted);
        formatted
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Numeric value of an entry, without the `%` suffix.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name)?.trim_end_matches('%').parse().ok()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn render(&self) -> String {
        let mut line = String::from(PREFIX);
        for (name, value) in &self.entries {
            line.push(' ');
            line.push_str(name);
            line.push(':');
            line.push_str(value);
        }
        line
    }
}

/// Read the summary at `path`; a missing file is an empty summary.
pub fn load(path: &Path) -> StorageResult<BenchSummary> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(BenchSummary::parse(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BenchSummary::default()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Atomically replace the summary at `path`, creating parent directories.
pub fn store(path: &Path, summary: &BenchSummary) -> StorageResult<()> {
    let dir: PathBuf = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StorageError::io(&dir, e))?;
    writeln!(tmp, "{}", summary.render()).map_err(|e| StorageError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| StorageError::io(path, e.error))?;
    Ok(())
}

/// Load, upsert `name`, store. Returns the formatted value written.
pub fn record(path: &Path, name: &str, delta: f64) -> StorageResult<String> {
    let mut summary = load(path)?;
    let formatted = summary.record(name, delta);
    store(path, &summary)?;
    Ok(formatted)
}
