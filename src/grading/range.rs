//! Numeric range primitives shared by the tier and flag evaluators.
//!
//! All comparisons round both the observed value and the configured bound to
//! [`COMPARE_DECIMALS`] places first, so subtraction noise such as
//! `0.30000000000000004` compares equal to `0.3`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::parse_number;

/// Decimal places both sides are rounded to before a range comparison.
pub const COMPARE_DECIMALS: i32 = 10;

/// Tolerance for the legacy single-value "approximately equals" checks.
pub const APPROX_EPSILON: f64 = 1e-6;

/// Inclusive `{min, max}` pair; either side may be absent.
///
/// A bound with neither side set is *not configured* and is skipped by the
/// evaluators. Deserialization is lenient: numeric strings are accepted and
/// anything that is not an object yields an unconfigured bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct Bound {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bound {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Bound { min, max }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Bound::new(Some(min), Some(max))
    }

    pub fn at_most(max: f64) -> Self {
        Bound::new(None, Some(max))
    }

    pub fn is_configured(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// `min > max`: configured, but no value can ever satisfy it.
    pub fn is_inverted(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => round_to(min, COMPARE_DECIMALS) > round_to(max, COMPARE_DECIMALS),
            _ => false,
        }
    }

    pub fn has_zero_side(&self) -> bool {
        self.min == Some(0.0) || self.max == Some(0.0)
    }
}

impl From<Value> for Bound {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Bound {
                min: map.get("min").and_then(parse_number),
                max: map.get("max").and_then(parse_number),
            },
            _ => Bound::default(),
        }
    }
}

/// Outcome of checking one value against one [`Bound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCheck {
    /// Neither side configured: skip, does not count.
    NotConfigured,
    Pass,
    Fail,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        // Already coarser than the rounding step.
        return value;
    }
    scaled.round() / factor
}

/// Check `value` against `bound`, inclusive on both configured sides.
///
/// A configured bound requires the value to be present and finite.
pub fn check_range(value: Option<f64>, bound: &Bound) -> RangeCheck {
    if !bound.is_configured() {
        return RangeCheck::NotConfigured;
    }
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return RangeCheck::Fail;
    };
    let value = round_to(value, COMPARE_DECIMALS);

    if let Some(min) = bound.min {
        if value < round_to(min, COMPARE_DECIMALS) {
            return RangeCheck::Fail;
        }
    }
    if let Some(max) = bound.max {
        if value > round_to(max, COMPARE_DECIMALS) {
            return RangeCheck::Fail;
        }
    }
    RangeCheck::Pass
}

/// Legacy exact-match check: `|value - target| < 1e-6`. Absent fails.
pub fn approx_equals(value: Option<f64>, target: f64) -> bool {
    value
        .filter(|v| v.is_finite())
        .is_some_and(|v| (v - target).abs() < APPROX_EPSILON)
}

/// Running tally of configured criteria for one tier or criteria set.
///
/// The set matches only when at least one criterion was configured and
/// none of them failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conjunction {
    configured: u32,
    failed: u32,
}

impl Conjunction {
    pub fn range(&mut self, value: Option<f64>, bound: &Bound) -> &mut Self {
        match check_range(value, bound) {
            RangeCheck::NotConfigured => {}
            RangeCheck::Pass => self.configured += 1,
            RangeCheck::Fail => {
                self.configured += 1;
                self.failed += 1;
            }
        }
        self
    }

    pub fn require(&mut self, passed: bool) -> &mut Self {
        self.configured += 1;
        if !passed {
            self.failed += 1;
        }
        self
    }

    pub fn configured(&self) -> u32 {
        self.configured
    }

    pub fn satisfied(&self) -> bool {
        self.configured > 0 && self.failed == 0
    }
}
