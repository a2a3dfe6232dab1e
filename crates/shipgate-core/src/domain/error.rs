//! Configuration error taxonomy.

use super::stage::StageKind;

/// A single problem found while validating a [`PipelineConfig`](super::config::PipelineConfig).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("project name must not be empty")]
    EmptyProjectName,

    #[error("metric #{index} has an empty name")]
    EmptyMetricName { index: usize },

    #[error("metric {name} is declared more than once")]
    DuplicateMetric { name: String },

    #[error("metric {name}: {field} must be a finite number")]
    NonFinite { name: String, field: &'static str },

    #[error("metric {name}: cap {cap} lies on the favourable side of target {target}")]
    CapInsideTarget { name: String, target: f64, cap: f64 },

    #[error("baseline for {name} must be a finite number")]
    NonFiniteBaseline { name: String },

    #[error("min_coverage {value} must be within 0..=100")]
    CoverageOutOfRange { value: f64 },

    #[error("stage {stage} cannot be retried")]
    NotRetryable { stage: StageKind },

    #[error("metric {name} reads stage {stage}, which runs after the decision")]
    StageAfterDecision { name: String, stage: StageKind },
}

/// Every issue found in one configuration. Fatal to a run; surfaced before any
/// stage executes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid configuration: {}", join_issues(.0))]
pub struct InvalidConfig(pub Vec<ConfigError>);

impl InvalidConfig {
    pub fn issues(&self) -> &[ConfigError] {
        &self.0
    }
}

fn join_issues(issues: &[ConfigError]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for configuration checks.
pub type Result<T> = std::result::Result<T, InvalidConfig>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_every_issue() {
        let err = InvalidConfig(vec![
            ConfigError::EmptyProjectName,
            ConfigError::DuplicateMetric {
                name: "bundle_size".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("invalid configuration"));
        assert!(msg.contains("project name must not be empty"));
        assert!(msg.contains("bundle_size"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_cap_inside_target_display() {
        let err = ConfigError::CapInsideTarget {
            name: "response_time".to_string(),
            target: -5.0,
            cap: -10.0,
        };
        assert!(err.to_string().contains("response_time"));
        assert!(err.to_string().contains("-10"));
    }
}
