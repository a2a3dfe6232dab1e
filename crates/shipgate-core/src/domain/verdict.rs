//! Gate verdicts and the final promote/hold decision.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Warn,
    Fail,
    /// No measurement available; never blocks.
    Skip,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            VerdictStatus::Pass => "PASS",
            VerdictStatus::Warn => "WARN",
            VerdictStatus::Fail => "FAIL",
            VerdictStatus::Skip => "SKIP",
        })
    }
}

/// One evaluated gate: a mandatory standard or a configured metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Name of the standard or metric evaluated.
    pub gate: String,
    pub status: VerdictStatus,
    pub reason: String,

    /// A mandatory FAIL forces HOLD.
    pub mandatory: bool,
}

impl GateVerdict {
    fn new(gate: impl Into<String>, status: VerdictStatus, reason: impl Into<String>) -> Self {
        Self {
            gate: gate.into(),
            status,
            reason: reason.into(),
            mandatory: false,
        }
    }

    pub fn pass(gate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(gate, VerdictStatus::Pass, reason)
    }

    pub fn warn(gate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(gate, VerdictStatus::Warn, reason)
    }

    pub fn fail(gate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(gate, VerdictStatus::Fail, reason)
    }

    pub fn skip(gate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(gate, VerdictStatus::Skip, reason)
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn blocks(&self) -> bool {
        self.mandatory && self.status == VerdictStatus::Fail
    }
}

/// Final pipeline decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Promote,
    Hold,
}

impl Decision {
    /// PROMOTE iff no verdict blocks.
    pub fn from_verdicts(verdicts: &[GateVerdict]) -> Self {
        if verdicts.iter().any(GateVerdict::blocks) {
            Decision::Hold
        } else {
            Decision::Promote
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Decision::Promote => "PROMOTE",
            Decision::Hold => "HOLD",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_mandatory_fail_blocks() {
        assert!(GateVerdict::fail("build", "exit 1").mandatory().blocks());
        assert!(!GateVerdict::fail("bundle_size", "over cap").blocks());
        assert!(!GateVerdict::warn("review", "long fn").mandatory().blocks());
        assert!(!GateVerdict::skip("throughput", "not measured").mandatory().blocks());
    }

    #[test]
    fn test_decision_from_verdicts() {
        let ok = vec![
            GateVerdict::pass("build", "ok").mandatory(),
            GateVerdict::warn("response_time", "within cap"),
        ];
        assert_eq!(Decision::from_verdicts(&ok), Decision::Promote);

        let held = vec![
            GateVerdict::pass("build", "ok").mandatory(),
            GateVerdict::fail("coverage", "79.9 < 80").mandatory(),
        ];
        assert_eq!(Decision::from_verdicts(&held), Decision::Hold);
        assert_eq!(Decision::from_verdicts(&[]), Decision::Promote);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let v = GateVerdict::warn("memory_usage", "within cap");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["status"], "WARN");
        assert_eq!(serde_json::to_string(&Decision::Hold).unwrap(), "\"HOLD\"");
    }
}
