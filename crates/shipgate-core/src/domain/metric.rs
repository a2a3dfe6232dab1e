//! Metric policies read from configuration.

use serde::{Deserialize, Serialize};

use super::stage::StageKind;

/// Which way a metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Policy for judging one measured value.
///
/// With `absolute = true`, `target` and `cap` are literal values. With
/// `absolute = false` they are signed percentage deltas against a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,

    pub target: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<f64>,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub absolute: bool,

    /// Explicit direction; inferred from unit/target/cap when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,

    /// Stage whose metrics carry the measurement. Any stage when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageKind>,

    /// Display grouping such as `performance` or `quality`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl MetricSpec {
    /// Percentage-delta policy, e.g. `relative("response_time", -5.0, Some(10.0))`.
    pub fn relative(name: impl Into<String>, target: f64, cap: Option<f64>) -> Self {
        Self {
            name: name.into(),
            target,
            cap,
            unit: "%".to_string(),
            absolute: false,
            direction: None,
            stage: None,
            category: None,
        }
    }

    /// Literal-value policy, e.g. `absolute("coverage", 80.0, "%")`.
    pub fn absolute(name: impl Into<String>, target: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target,
            cap: None,
            unit: unit.into(),
            absolute: true,
            direction: None,
            stage: None,
            category: None,
        }
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn from_stage(mut self, stage: StageKind) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Resolved improvement direction.
    ///
    /// Absolute metrics with unit `max` or `count` are ceilings; other
    /// absolute metrics are floors. Relative metrics follow the sign of
    /// `target`, then the sign of `cap`, and default to lower-is-better.
    pub fn direction(&self) -> Direction {
        if let Some(d) = self.direction {
            return d;
        }
        if self.absolute {
            return match self.unit.as_str() {
                "max" | "count" => Direction::LowerIsBetter,
                _ => Direction::HigherIsBetter,
            };
        }
        if self.target < 0.0 {
            Direction::LowerIsBetter
        } else if self.target > 0.0 {
            Direction::HigherIsBetter
        } else {
            match self.cap {
                Some(c) if c < 0.0 => Direction::HigherIsBetter,
                _ => Direction::LowerIsBetter,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_direction_from_unit() {
        assert_eq!(
            MetricSpec::absolute("coverage", 80.0, "%").direction(),
            Direction::HigherIsBetter
        );
        assert_eq!(
            MetricSpec::absolute("cyclomatic_complexity", 10.0, "max").direction(),
            Direction::LowerIsBetter
        );
        assert_eq!(
            MetricSpec::absolute("bandit_issues", 0.0, "count").direction(),
            Direction::LowerIsBetter
        );
    }

    #[test]
    fn test_relative_direction_from_signs() {
        assert_eq!(
            MetricSpec::relative("response_time", -5.0, Some(10.0)).direction(),
            Direction::LowerIsBetter
        );
        assert_eq!(
            MetricSpec::relative("throughput", 5.0, Some(-10.0)).direction(),
            Direction::HigherIsBetter
        );
        assert_eq!(
            MetricSpec::relative("memory_usage", 0.0, Some(15.0)).direction(),
            Direction::LowerIsBetter
        );
        assert_eq!(
            MetricSpec::relative("hit_rate", 0.0, Some(-3.0)).direction(),
            Direction::HigherIsBetter
        );
        assert_eq!(
            MetricSpec::relative("binary_size", 0.0, None).direction(),
            Direction::LowerIsBetter
        );
    }

    #[test]
    fn test_explicit_direction_wins() {
        let spec = MetricSpec::absolute("latency_p99", 250.0, "ms")
            .with_direction(Direction::LowerIsBetter);
        assert_eq!(spec.direction(), Direction::LowerIsBetter);
    }

    #[test]
    fn test_deserialize_minimal_entry() {
        let spec: MetricSpec =
            serde_json::from_str(r#"{"name":"compile_time","target":-5,"cap":20,"unit":"%"}"#)
                .unwrap();
        assert!(!spec.absolute);
        assert_eq!(spec.cap, Some(20.0));
        assert!(spec.stage.is_none());
    }
}
