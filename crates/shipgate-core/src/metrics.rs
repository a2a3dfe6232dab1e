//! Global atomic counters for pipeline observability.
//!
//! Counters are incremented at the call site. [`Metrics::flush`] emits the
//! current values as a single `tracing::info!` event, e.g. at process exit.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    runs_started: AtomicU64,
    runs_promoted: AtomicU64,
    runs_held: AtomicU64,
    stage_attempts: AtomicU64,
    stage_retries: AtomicU64,
    stage_timeouts: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_promoted: AtomicU64::new(0),
            runs_held: AtomicU64::new(0),
            stage_attempts: AtomicU64::new(0),
            stage_retries: AtomicU64::new(0),
            stage_timeouts: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    pub fn inc_promoted(&self) {
        self.runs_promoted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_promoted", "counter incremented");
    }

    pub fn inc_held(&self) {
        self.runs_held.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_held", "counter incremented");
    }

    pub fn inc_stage_attempts(&self) {
        self.stage_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.stage_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stage_retries", "counter incremented");
    }

    pub fn inc_timeouts(&self) {
        self.stage_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stage_timeouts", "counter incremented");
    }

    /// Emit all current counter values as one `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            runs_promoted = self.runs_promoted(),
            runs_held = self.runs_held(),
            stage_attempts = self.stage_attempts(),
            stage_retries = self.stage_retries(),
            stage_timeouts = self.stage_timeouts(),
        );
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn runs_promoted(&self) -> u64 {
        self.runs_promoted.load(Ordering::Relaxed)
    }

    pub fn runs_held(&self) -> u64 {
        self.runs_held.load(Ordering::Relaxed)
    }

    pub fn stage_attempts(&self) -> u64 {
        self.stage_attempts.load(Ordering::Relaxed)
    }

    pub fn stage_retries(&self) -> u64 {
        self.stage_retries.load(Ordering::Relaxed)
    }

    pub fn stage_timeouts(&self) -> u64 {
        self.stage_timeouts.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.runs_promoted,
            &self.runs_held,
            &self.stage_attempts,
            &self.stage_retries,
            &self.stage_timeouts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_runs_started();
        m.inc_runs_started();
        m.inc_promoted();
        m.inc_stage_attempts();
        m.inc_stage_attempts();
        m.inc_stage_attempts();
        m.inc_retries();
        m.inc_timeouts();
        assert_eq!(m.runs_started(), 2);
        assert_eq!(m.runs_promoted(), 1);
        assert_eq!(m.runs_held(), 0);
        assert_eq!(m.stage_attempts(), 3);
        assert_eq!(m.stage_retries(), 1);
        assert_eq!(m.stage_timeouts(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_held();
        m.inc_retries();
        m.reset();
        assert_eq!(m.runs_held(), 0);
        assert_eq!(m.stage_retries(), 0);
    }
}
