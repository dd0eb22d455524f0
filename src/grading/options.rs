//! The grading options document: tier table plus win-flag table.
//!
//! Besides the canonical shape this module reads the older settings
//! document (`column17` / `column18`), and lints a document for entries
//! that are ambiguous or can never match.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::flag::{CriteriaSet, FlagCategory, FlagConfig};
use super::range::Bound;
use super::tier::{grade_list, TierConfig, TierCriteria, TierLabel};
use crate::db::models::parse_number;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingOptions {
    pub tiers: TierConfig,
    pub flags: FlagConfig,
}

/// Something the configuration owner should look at. Never blocks grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    /// e.g. `tier A+`, `flag league S (secondary)`
    pub scope: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(scope: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigWarning {
            scope: scope.into(),
            message: message.into(),
        }
    }
}

impl GradingOptions {
    /// Parse a stored document in either the canonical or the legacy shape.
    pub fn from_document(doc: &Value) -> anyhow::Result<Self> {
        if is_legacy(doc) {
            return Ok(Self::from_legacy(doc));
        }
        Ok(serde_json::from_value(doc.clone())?)
    }

    /// Convert the older settings document.
    ///
    /// `column17.gradeMapping` holds tiers keyed `aPlus/a/bPlus/b/c/d`;
    /// `column18.leagueGradeMapping` holds flag categories keyed by league
    /// grade, with `optionSet2` as the alternative set.
    pub fn from_legacy(doc: &Value) -> Self {
        let mut tiers = TierConfig::new();
        if let Some(mapping) = doc
            .pointer("/column17/gradeMapping")
            .and_then(Value::as_object)
        {
            for (key, entry) in mapping {
                let Some(label) = TierLabel::parse(key) else {
                    warn!("Legacy options: unknown tier key '{}'", key);
                    continue;
                };
                tiers.insert(label, legacy_tier(entry));
            }
        }

        let mut flags = FlagConfig::new();
        if let Some(mapping) = doc
            .pointer("/column18/leagueGradeMapping")
            .and_then(Value::as_object)
        {
            for (grade, entry) in mapping {
                let secondary = entry
                    .get("optionSet2")
                    .filter(|v| v.is_object())
                    .map(legacy_criteria_set);
                flags = flags.with_league(
                    grade,
                    FlagCategory {
                        primary: legacy_criteria_set(entry),
                        secondary,
                    },
                );
            }
        }

        GradingOptions { tiers, flags }
    }

    /// Report zero bounds and values, inverted ranges and unreachable entries.
    ///
    /// Zeros are evaluated as genuine thresholds; older documents used
    /// a literal zero to mean "disabled", so they are surfaced for review.
    pub fn lint(&self) -> Vec<ConfigWarning> {
        let mut out = Vec::new();

        for (label, criteria) in self.tiers.iter() {
            let scope = format!("tier {}", label);
            if criteria.configured_count() == 0 {
                out.push(ConfigWarning::new(&scope, "no criteria configured; tier can never match"));
            }
            lint_bounds(&scope, &criteria.bounds(), &mut out);
            lint_values(&scope, &criteria.values(), &mut out);
        }

        let categories = self
            .flags
            .default
            .iter()
            .map(|c| ("flag default".to_string(), c))
            .chain(
                self.flags
                    .leagues
                    .iter()
                    .map(|(grade, c)| (format!("flag league {}", grade), c)),
            );
        for (scope, category) in categories {
            if category.is_vacuous() {
                out.push(ConfigWarning::new(&scope, "no criteria configured; flag can never be set"));
            }
            lint_bounds(&scope, &category.primary.bounds(), &mut out);
            lint_values(&scope, &category.primary.values(), &mut out);
            if let Some(secondary) = &category.secondary {
                let scope = format!("{} (secondary)", scope);
                lint_bounds(&scope, &secondary.bounds(), &mut out);
                lint_values(&scope, &secondary.values(), &mut out);
            }
        }

        out
    }
}

fn lint_bounds(scope: &str, bounds: &[(&'static str, &Bound)], out: &mut Vec<ConfigWarning>) {
    for (name, bound) in bounds {
        if bound.is_inverted() {
            out.push(ConfigWarning::new(
                scope,
                format!("{}: min is greater than max; never satisfiable", name),
            ));
        }
        if bound.has_zero_side() {
            out.push(ConfigWarning::new(
                scope,
                format!("{}: zero bound is applied as a real threshold, not as 'disabled'", name),
            ));
        }
    }
}

fn lint_values(scope: &str, values: &[(&'static str, Option<f64>)], out: &mut Vec<ConfigWarning>) {
    for (name, value) in values {
        if *value == Some(0.0) {
            out.push(ConfigWarning::new(
                scope,
                format!("{}: zero value is applied as a real threshold, not as 'disabled'", name),
            ));
        }
    }
}

fn is_legacy(doc: &Value) -> bool {
    doc.get("column17").is_some() || doc.get("column18").is_some()
}

fn legacy_range(entry: &Value, key: &str) -> Bound {
    entry.get(key).cloned().map(Bound::from).unwrap_or_default()
}

/// Single value under `key`, or the `min` of the older `{key}Range` form.
fn legacy_single(entry: &Value, key: &str, range_key: &str) -> Option<f64> {
    entry
        .get(key)
        .and_then(parse_number)
        .or_else(|| entry.pointer(&format!("/{}/min", range_key)).and_then(parse_number))
}

fn legacy_switch(entry: &Value, key: &str) -> bool {
    match entry.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn legacy_tier(entry: &Value) -> TierCriteria {
    let allowed_league_grades = entry
        .get("leagueGrades")
        .map(grade_list)
        .unwrap_or_default();

    TierCriteria {
        over_drop_range: legacy_range(entry, "jMinusNRange"),
        win_drop_range: legacy_range(entry, "hMinusMRange"),
        live_win_odds_range: legacy_range(entry, "mValueRange"),
        opening_over_line_range: legacy_range(entry, "iValueRange"),
        ordered_over_inequality: legacy_switch(entry, "jGreaterThanLGreaterThanN"),
        checkpoint_over_tolerance: None,
        live_over_tolerance: None,
        checkpoint_over_odds: legacy_single(entry, "lValue", "lRange"),
        live_over_odds: legacy_single(entry, "nValue", "nRange"),
        allowed_league_grades,
    }
}

fn legacy_criteria_set(entry: &Value) -> CriteriaSet {
    CriteriaSet {
        win_drop_range: legacy_range(entry, "hMinusMRange"),
        live_win_odds_range: legacy_range(entry, "mValueRange"),
        opening_win_odds_range: legacy_range(entry, "hValueRange"),
        ordered_win_inequality: legacy_switch(entry, "hGreaterThanKGreaterThanM"),
        checkpoint_win_odds_cap: legacy_single(entry, "kValue", "kRange"),
        live_win_odds_cap: legacy_single(entry, "mValue", "mRange"),
    }
}
