//! Tier grading: first match in fixed priority order A+ → A → B+ → B → C → D.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ordering::holds;
use super::range::{approx_equals, Bound, Conjunction};
use super::{normalize_grade, Snapshot};
use crate::db::models::{lenient_bool, lenient_f64, parse_text};

/// Ordered quality label. Variant order is evaluation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TierLabel {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
}

impl TierLabel {
    /// Canonical priority, highest first.
    pub const PRIORITY: [TierLabel; 6] = [
        TierLabel::APlus,
        TierLabel::A,
        TierLabel::BPlus,
        TierLabel::B,
        TierLabel::C,
        TierLabel::D,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierLabel::APlus => "A+",
            TierLabel::A => "A",
            TierLabel::BPlus => "B+",
            TierLabel::B => "B",
            TierLabel::C => "C",
            TierLabel::D => "D",
        }
    }

    /// Accepts "A+" style labels and the camel-case keys ("aPlus") used by
    /// older settings documents. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a+" | "aplus" | "a_plus" => Some(TierLabel::APlus),
            "a" => Some(TierLabel::A),
            "b+" | "bplus" | "b_plus" => Some(TierLabel::BPlus),
            "b" => Some(TierLabel::B),
            "c" => Some(TierLabel::C),
            "d" => Some(TierLabel::D),
            _ => None,
        }
    }
}

impl fmt::Display for TierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output-contract string for an optional tier: the label, or "" for no match.
pub fn tier_label_str(tier: Option<TierLabel>) -> &'static str {
    tier.map(|t| t.as_str()).unwrap_or("")
}

/// Criteria for one tier. Every field is optional; only configured ones count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCriteria {
    pub over_drop_range: Bound,
    pub win_drop_range: Bound,
    pub live_win_odds_range: Bound,
    pub opening_over_line_range: Bound,
    /// opening over odds > checkpoint over odds > live over odds
    #[serde(deserialize_with = "lenient_bool")]
    pub ordered_over_inequality: bool,
    /// Slack subtracted from the checkpoint over odds in the ordering check
    #[serde(deserialize_with = "lenient_f64")]
    pub checkpoint_over_tolerance: Option<f64>,
    /// Slack subtracted from the live over odds in the ordering check
    #[serde(deserialize_with = "lenient_f64")]
    pub live_over_tolerance: Option<f64>,
    /// Legacy: checkpoint over odds must equal this (±1e-6)
    #[serde(deserialize_with = "lenient_f64")]
    pub checkpoint_over_odds: Option<f64>,
    /// Legacy: live over odds must equal this (±1e-6)
    #[serde(deserialize_with = "lenient_f64")]
    pub live_over_odds: Option<f64>,
    #[serde(deserialize_with = "lenient_grades")]
    pub allowed_league_grades: BTreeSet<String>,
}

/// League grades from a JSON list (or a lone scalar), coerced to text.
/// Blank entries are dropped so they cannot match a row with no grade.
pub(crate) fn grade_list(value: &Value) -> BTreeSet<String> {
    let items: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Null => &[],
        other => std::slice::from_ref(other),
    };
    items
        .iter()
        .map(parse_text)
        .filter(|g| !g.is_empty())
        .collect()
}

fn lenient_grades<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(grade_list(&value))
}

impl TierCriteria {
    fn tally(&self, snap: &Snapshot<'_>) -> Conjunction {
        let row = snap.row;
        let mut c = Conjunction::default();
        c.range(snap.over_drop, &self.over_drop_range)
            .range(snap.win_drop, &self.win_drop_range)
            .range(row.live_win_odds, &self.live_win_odds_range)
            .range(row.opening_over_line, &self.opening_over_line_range);

        if self.ordered_over_inequality {
            c.require(holds(
                row.opening_over_odds,
                row.over_odds_at_checkpoint,
                row.live_over_odds,
                self.checkpoint_over_tolerance,
                self.live_over_tolerance,
            ));
        }
        if let Some(target) = self.checkpoint_over_odds {
            c.require(approx_equals(row.over_odds_at_checkpoint, target));
        }
        if let Some(target) = self.live_over_odds {
            c.require(approx_equals(row.live_over_odds, target));
        }
        if !self.allowed_league_grades.is_empty() {
            let grade = normalize_grade(&row.league_grade);
            c.require(
                !grade.is_empty()
                    && self
                        .allowed_league_grades
                        .iter()
                        .any(|allowed| normalize_grade(allowed) == grade),
            );
        }
        c
    }

    /// Number of configured criteria. Zero means the tier can never match.
    pub fn configured_count(&self) -> u32 {
        let mut n = [
            &self.over_drop_range,
            &self.win_drop_range,
            &self.live_win_odds_range,
            &self.opening_over_line_range,
        ]
        .iter()
        .filter(|b| b.is_configured())
        .count() as u32;
        n += self.ordered_over_inequality as u32;
        n += self.checkpoint_over_odds.is_some() as u32;
        n += self.live_over_odds.is_some() as u32;
        n += !self.allowed_league_grades.is_empty() as u32;
        n
    }

    pub fn matches(&self, snap: &Snapshot<'_>) -> bool {
        self.tally(snap).satisfied()
    }

    pub(crate) fn bounds(&self) -> [(&'static str, &Bound); 4] {
        [
            ("over_drop_range", &self.over_drop_range),
            ("win_drop_range", &self.win_drop_range),
            ("live_win_odds_range", &self.live_win_odds_range),
            ("opening_over_line_range", &self.opening_over_line_range),
        ]
    }

    pub(crate) fn values(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("checkpoint_over_tolerance", self.checkpoint_over_tolerance),
            ("live_over_tolerance", self.live_over_tolerance),
            ("checkpoint_over_odds", self.checkpoint_over_odds),
            ("live_over_odds", self.live_over_odds),
        ]
    }
}

/// Tier table keyed by label. Missing tiers have no criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TierConfig {
    tiers: BTreeMap<TierLabel, TierCriteria>,
}

impl TierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: TierLabel, criteria: TierCriteria) -> Self {
        self.tiers.insert(label, criteria);
        self
    }

    pub fn insert(&mut self, label: TierLabel, criteria: TierCriteria) {
        self.tiers.insert(label, criteria);
    }

    pub fn get(&self, label: TierLabel) -> Option<&TierCriteria> {
        self.tiers.get(&label)
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Configured tiers in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (TierLabel, &TierCriteria)> {
        TierLabel::PRIORITY
            .into_iter()
            .filter_map(move |label| self.tiers.get(&label).map(|c| (label, c)))
    }

    /// First tier, in priority order, whose configured criteria all pass.
    pub fn evaluate(&self, snap: &Snapshot<'_>) -> Option<TierLabel> {
        let matched = self
            .iter()
            .find(|(_, criteria)| criteria.matches(snap))
            .map(|(label, _)| label);
        if let Some(label) = matched {
            debug!(
                "Tier {} matched for {} vs {}",
                label, snap.row.home_team, snap.row.away_team
            );
        }
        matched
    }
}

impl<'de> Deserialize<'de> for TierConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match Value::deserialize(deserializer)? {
            Value::Object(map) => map,
            Value::Null => return Ok(TierConfig::default()),
            other => {
                warn!("Tier table is not an object ({}); no tiers configured", other);
                return Ok(TierConfig::default());
            }
        };

        let mut tiers = BTreeMap::new();
        for (key, value) in raw {
            let Some(label) = TierLabel::parse(&key) else {
                warn!("Ignoring unknown tier label '{}'", key);
                continue;
            };
            let criteria = serde_json::from_value::<TierCriteria>(value).unwrap_or_else(|e| {
                warn!("Tier {} is malformed ({}); treating it as unconfigured", label, e);
                TierCriteria::default()
            });
            tiers.insert(label, criteria);
        }
        Ok(TierConfig { tiers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::OddsRow;
    use serde_json::json;

    fn scenario_c_row() -> OddsRow {
        OddsRow {
            opening_over_odds: Some(2.10),
            live_over_odds: Some(1.60),
            over_odds_at_checkpoint: Some(1.90),
            opening_over_line: Some(2.5),
            league_grade: "S".into(),
            ..Default::default()
        }
    }

    fn grades(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_c_returns_a() {
        let row = scenario_c_row();
        let config = TierConfig::new().with(
            TierLabel::A,
            TierCriteria {
                over_drop_range: Bound::between(0.3, 0.8),
                allowed_league_grades: grades(&["S"]),
                ..Default::default()
            },
        );
        assert_eq!(config.evaluate(&Snapshot::of(&row)), Some(TierLabel::A));
    }

    #[test]
    fn first_match_wins_over_easier_lower_tier() {
        let row = scenario_c_row();
        let config = TierConfig::new()
            .with(
                TierLabel::D,
                TierCriteria {
                    over_drop_range: Bound::new(Some(0.0), None),
                    ..Default::default()
                },
            )
            .with(
                TierLabel::APlus,
                TierCriteria {
                    over_drop_range: Bound::between(0.45, 0.55),
                    ordered_over_inequality: true,
                    ..Default::default()
                },
            );
        assert_eq!(config.evaluate(&Snapshot::of(&row)), Some(TierLabel::APlus));
    }

    #[test]
    fn empty_tier_is_unreachable() {
        let row = scenario_c_row();
        let config = TierConfig::new()
            .with(TierLabel::BPlus, TierCriteria::default())
            .with(
                TierLabel::C,
                TierCriteria {
                    opening_over_line_range: Bound::between(2.0, 3.0),
                    ..Default::default()
                },
            );
        assert_eq!(config.evaluate(&Snapshot::of(&row)), Some(TierLabel::C));
        assert_eq!(TierCriteria::default().configured_count(), 0);

        let only_empty = TierConfig::new().with(TierLabel::BPlus, TierCriteria::default());
        assert_eq!(only_empty.evaluate(&Snapshot::of(&OddsRow::default())), None);
        assert_eq!(only_empty.evaluate(&Snapshot::of(&row)), None);
    }

    #[test]
    fn missing_field_fails_configured_criterion() {
        let mut row = scenario_c_row();
        row.opening_over_line = None;
        let config = TierConfig::new().with(
            TierLabel::B,
            TierCriteria {
                over_drop_range: Bound::between(0.3, 0.8),
                opening_over_line_range: Bound::between(2.0, 3.0),
                ..Default::default()
            },
        );
        assert_eq!(config.evaluate(&Snapshot::of(&row)), None);
    }

    #[test]
    fn league_grade_filter_is_case_and_space_insensitive() {
        let mut row = scenario_c_row();
        row.league_grade = " s ".into();
        let config = TierConfig::new().with(
            TierLabel::A,
            TierCriteria {
                allowed_league_grades: grades(&["S"]),
                ..Default::default()
            },
        );
        assert_eq!(config.evaluate(&Snapshot::of(&row)), Some(TierLabel::A));

        row.league_grade = "B".into();
        assert_eq!(config.evaluate(&Snapshot::of(&row)), None);
    }

    #[test]
    fn ordered_over_inequality_with_tolerance() {
        let mut row = scenario_c_row();
        row.over_odds_at_checkpoint = Some(2.15);
        let strict = TierCriteria {
            ordered_over_inequality: true,
            ..Default::default()
        };
        assert!(!strict.matches(&Snapshot::of(&row)));

        let slack = TierCriteria {
            ordered_over_inequality: true,
            checkpoint_over_tolerance: Some(0.1),
            ..Default::default()
        };
        assert!(slack.matches(&Snapshot::of(&row)));
    }

    #[test]
    fn legacy_exact_match_checks() {
        let row = scenario_c_row();
        let criteria = TierCriteria {
            checkpoint_over_odds: Some(1.9),
            live_over_odds: Some(1.6),
            ..Default::default()
        };
        assert!(criteria.matches(&Snapshot::of(&row)));

        let off = TierCriteria {
            checkpoint_over_odds: Some(1.95),
            ..Default::default()
        };
        assert!(!off.matches(&Snapshot::of(&row)));
    }

    #[test]
    fn deserializes_labels_and_skips_garbage() {
        let config: TierConfig = serde_json::from_value(json!({
            "A+": { "over_drop_range": { "min": "0.3", "max": 0.8 } },
            "bPlus": { "ordered_over_inequality": "true" },
            "Z": { "over_drop_range": { "min": 0.1 } },
            "C": "not an object"
        }))
        .unwrap();

        let a_plus = config.get(TierLabel::APlus).unwrap();
        assert_eq!(a_plus.over_drop_range, Bound::between(0.3, 0.8));
        assert!(config.get(TierLabel::BPlus).unwrap().ordered_over_inequality);
        assert_eq!(config.get(TierLabel::C).unwrap().configured_count(), 0);
        assert_eq!(config.iter().count(), 3);
    }

    #[test]
    fn blank_allowed_grade_never_matches_ungraded_row() {
        let config: TierConfig = serde_json::from_value(json!({
            "A+": { "allowed_league_grades": ["", " "] }
        }))
        .unwrap();
        let a_plus = config.get(TierLabel::APlus).unwrap();
        assert!(a_plus.allowed_league_grades.is_empty());
        assert_eq!(config.evaluate(&Snapshot::of(&OddsRow::default())), None);

        let built = TierCriteria {
            allowed_league_grades: [String::new()].into_iter().collect(),
            ..Default::default()
        };
        assert!(!built.matches(&Snapshot::of(&OddsRow::default())));
    }

    #[test]
    fn non_string_grade_entries_keep_the_tier() {
        let config: TierConfig = serde_json::from_value(json!({
            "A": {
                "over_drop_range": { "min": 0.3 },
                "allowed_league_grades": ["S", 1]
            }
        }))
        .unwrap();
        let a = config.get(TierLabel::A).unwrap();
        assert_eq!(a.configured_count(), 2);
        let expected: BTreeSet<String> = ["1".to_string(), "S".to_string()].into_iter().collect();
        assert_eq!(a.allowed_league_grades, expected);

        let mut row = scenario_c_row();
        row.league_grade = "s".into();
        assert_eq!(config.evaluate(&Snapshot::of(&row)), Some(TierLabel::A));
    }

    #[test]
    fn labels_round_trip_through_strings() {
        for label in TierLabel::PRIORITY {
            assert_eq!(TierLabel::parse(label.as_str()), Some(label));
        }
        assert_eq!(tier_label_str(None), "");
        assert_eq!(tier_label_str(Some(TierLabel::BPlus)), "B+");
    }
}
