//! Metric evaluator.
//!
//! Classifies one measured value against a [`MetricSpec`]. Pure and
//! deterministic: identical inputs always yield an identical [`GateVerdict`].
//!
//! Absolute specs compare the measured value to `target` in the metric's
//! favourable direction, with `cap` as a hard upper bound. Relative specs
//! compare the percentage delta against a baseline: meeting `target` is PASS,
//! missing it but staying within `cap` (inclusive) is WARN, anything beyond is
//! FAIL.

use crate::domain::{Direction, GateVerdict, MetricSpec};

/// Reason recorded when a relative metric has no usable baseline.
pub const UNDEFINED_BASELINE: &str = "undefined baseline";

/// Reason recorded when the measurement is NaN or infinite.
pub const NON_FINITE_MEASUREMENT: &str = "non-finite measurement";

/// Evaluate `measured` against `spec`. `baseline` is only read for relative specs.
pub fn evaluate(spec: &MetricSpec, measured: f64, baseline: Option<f64>) -> GateVerdict {
    if !measured.is_finite() {
        return GateVerdict::fail(&spec.name, NON_FINITE_MEASUREMENT);
    }
    if spec.absolute {
        evaluate_absolute(spec, measured)
    } else {
        evaluate_relative(spec, measured, baseline)
    }
}

/// Percentage change from `baseline` to `measured`. `None` when the baseline
/// cannot anchor a ratio.
pub fn percent_delta(measured: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 || !baseline.is_finite() {
        return None;
    }
    Some((measured - baseline) * 100.0 / baseline)
}

fn meets(direction: Direction, value: f64, bound: f64) -> bool {
    match direction {
        Direction::HigherIsBetter => value >= bound,
        Direction::LowerIsBetter => value <= bound,
    }
}

fn evaluate_absolute(spec: &MetricSpec, measured: f64) -> GateVerdict {
    let unit = &spec.unit;
    let value = format!("{measured}{unit}");

    if let Some(cap) = spec.cap {
        if measured > cap {
            return GateVerdict::fail(
                &spec.name,
                format!("{value} exceeds cap {cap}{unit}"),
            );
        }
    }

    let direction = spec.direction();
    if meets(direction, measured, spec.target) {
        GateVerdict::pass(
            &spec.name,
            format!("{value} meets target {}{unit}", spec.target),
        )
    } else {
        let side = match direction {
            Direction::HigherIsBetter => "below",
            Direction::LowerIsBetter => "above",
        };
        GateVerdict::fail(
            &spec.name,
            format!("{value} {side} target {}{unit}", spec.target),
        )
    }
}

fn evaluate_relative(spec: &MetricSpec, measured: f64, baseline: Option<f64>) -> GateVerdict {
    let Some(delta) = baseline.and_then(|b| percent_delta(measured, b)) else {
        return GateVerdict::fail(&spec.name, UNDEFINED_BASELINE);
    };

    let direction = spec.direction();
    let bounds = match spec.cap {
        Some(cap) => format!("target {:+.1}%, cap {:+.1}%", spec.target, cap),
        None => format!("target {:+.1}%", spec.target),
    };
    let observed = format!("delta {delta:+.1}% ({measured} vs baseline {})", baseline.unwrap_or_default());

    if meets(direction, delta, spec.target) {
        return GateVerdict::pass(&spec.name, format!("{observed} meets {bounds}"));
    }

    match spec.cap {
        Some(cap) if meets(direction, delta, cap) => GateVerdict::warn(
            &spec.name,
            format!("{observed} misses target but stays within cap; {bounds}"),
        ),
        Some(_) => GateVerdict::fail(&spec.name, format!("{observed} beyond cap; {bounds}")),
        None => GateVerdict::fail(&spec.name, format!("{observed} misses {bounds}")),
    }
}
