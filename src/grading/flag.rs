//! Win flag: per-league-grade criteria sets, primary OR secondary.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ordering::holds;
use super::range::{Bound, Conjunction};
use super::{normalize_grade, Snapshot};
use crate::db::models::{lenient_bool, lenient_f64};

/// A bundle of optionally-configured win-market checks; all configured
/// checks must pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaSet {
    pub win_drop_range: Bound,
    pub live_win_odds_range: Bound,
    pub opening_win_odds_range: Bound,
    /// opening win odds > checkpoint win odds > live win odds
    #[serde(deserialize_with = "lenient_bool")]
    pub ordered_win_inequality: bool,
    /// Fail when the checkpoint win odds exceed this
    #[serde(deserialize_with = "lenient_f64")]
    pub checkpoint_win_odds_cap: Option<f64>,
    /// Fail when the live win odds exceed this
    #[serde(deserialize_with = "lenient_f64")]
    pub live_win_odds_cap: Option<f64>,
}

impl CriteriaSet {
    pub fn matches(&self, snap: &Snapshot<'_>) -> bool {
        let row = snap.row;
        let mut c = Conjunction::default();
        c.range(snap.win_drop, &self.win_drop_range)
            .range(row.live_win_odds, &self.live_win_odds_range)
            .range(row.opening_win_odds, &self.opening_win_odds_range);

        if self.ordered_win_inequality {
            c.require(holds(
                row.opening_win_odds,
                row.win_odds_at_checkpoint,
                row.live_win_odds,
                None,
                None,
            ));
        }
        if let Some(cap) = self.checkpoint_win_odds_cap {
            c.range(row.win_odds_at_checkpoint, &Bound::at_most(cap));
        }
        if let Some(cap) = self.live_win_odds_cap {
            c.range(row.live_win_odds, &Bound::at_most(cap));
        }
        c.satisfied()
    }

    pub fn configured_count(&self) -> u32 {
        let mut n = [
            &self.win_drop_range,
            &self.live_win_odds_range,
            &self.opening_win_odds_range,
        ]
        .iter()
        .filter(|b| b.is_configured())
        .count() as u32;
        n += self.ordered_win_inequality as u32;
        n += self.checkpoint_win_odds_cap.is_some() as u32;
        n += self.live_win_odds_cap.is_some() as u32;
        n
    }

    pub(crate) fn bounds(&self) -> [(&'static str, &Bound); 3] {
        [
            ("win_drop_range", &self.win_drop_range),
            ("live_win_odds_range", &self.live_win_odds_range),
            ("opening_win_odds_range", &self.opening_win_odds_range),
        ]
    }

    pub(crate) fn values(&self) -> [(&'static str, Option<f64>); 2] {
        [
            ("checkpoint_win_odds_cap", self.checkpoint_win_odds_cap),
            ("live_win_odds_cap", self.live_win_odds_cap),
        ]
    }
}

/// The criteria for one league grade: a primary set and an optional
/// alternative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlagCategory {
    pub primary: CriteriaSet,
    pub secondary: Option<CriteriaSet>,
}

impl FlagCategory {
    pub fn matches(&self, snap: &Snapshot<'_>) -> bool {
        if self.primary.matches(snap) {
            debug!("Win flag set by primary criteria for {}", snap.row.home_team);
            return true;
        }
        let secondary = self.secondary.as_ref().is_some_and(|s| s.matches(snap));
        if secondary {
            debug!("Win flag set by secondary criteria for {}", snap.row.home_team);
        }
        secondary
    }

    /// Both sets together configure nothing.
    pub fn is_vacuous(&self) -> bool {
        self.primary.configured_count() == 0
            && self.secondary.as_ref().map_or(true, |s| s.configured_count() == 0)
    }
}

/// Each set is parsed on its own, so a malformed alternative leaves the
/// primary set intact.
impl<'de> Deserialize<'de> for FlagCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut raw = match Value::deserialize(deserializer)? {
            Value::Object(map) => map,
            Value::Null => return Ok(FlagCategory::default()),
            other => {
                warn!("Flag category is not an object ({}); treating it as unconfigured", other);
                return Ok(FlagCategory::default());
            }
        };

        let primary = raw
            .remove("primary")
            .and_then(|v| parse_set("primary", v))
            .unwrap_or_default();
        let secondary = raw
            .remove("secondary")
            .and_then(|v| parse_set("secondary", v));
        Ok(FlagCategory { primary, secondary })
    }
}

fn parse_set(name: &str, value: Value) -> Option<CriteriaSet> {
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value)
        .map_err(|e| warn!("Flag criteria '{}' is malformed ({}); ignoring it", name, e))
        .ok()
}

/// League-grade lookup table with a fallback entry for ungrouped grades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlagConfig {
    pub default: Option<FlagCategory>,
    pub leagues: BTreeMap<String, FlagCategory>,
}

impl FlagConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_league(mut self, grade: &str, category: FlagCategory) -> Self {
        self.leagues.insert(normalize_grade(grade), category);
        self
    }

    pub fn with_default(mut self, category: FlagCategory) -> Self {
        self.default = Some(category);
        self
    }

    /// Entry for `league_grade`, falling back to the default entry.
    pub fn resolve(&self, league_grade: &str) -> Option<&FlagCategory> {
        self.leagues
            .get(&normalize_grade(league_grade))
            .or(self.default.as_ref())
    }

    pub fn evaluate(&self, snap: &Snapshot<'_>) -> bool {
        self.resolve(&snap.row.league_grade)
            .is_some_and(|category| category.matches(snap))
    }
}

impl<'de> Deserialize<'de> for FlagConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut raw = match Value::deserialize(deserializer)? {
            Value::Object(map) => map,
            Value::Null => return Ok(FlagConfig::default()),
            other => {
                warn!("Flag table is not an object ({}); no categories configured", other);
                return Ok(FlagConfig::default());
            }
        };

        let default = raw
            .remove("default")
            .filter(|v| !v.is_null())
            .map(|v| parse_category("default", v));

        let mut leagues = BTreeMap::new();
        match raw.remove("leagues") {
            Some(Value::Object(map)) => {
                for (grade, value) in map {
                    let category = parse_category(&grade, value);
                    leagues.insert(normalize_grade(&grade), category);
                }
            }
            None | Some(Value::Null) => {}
            Some(other) => warn!("Flag leagues table is not an object ({}); ignoring", other),
        }

        Ok(FlagConfig { default, leagues })
    }
}

fn parse_category(name: &str, value: Value) -> FlagCategory {
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(
            "Flag category '{}' is malformed ({}); treating it as unconfigured",
            name, e
        );
        FlagCategory::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::OddsRow;
    use serde_json::json;

    fn scenario_a_row() -> OddsRow {
        OddsRow {
            opening_win_odds: Some(2.00),
            live_win_odds: Some(1.70),
            win_odds_at_checkpoint: Some(1.90),
            league_grade: "A".into(),
            ..Default::default()
        }
    }

    fn scenario_config() -> FlagConfig {
        FlagConfig::new().with_league(
            "A",
            FlagCategory {
                primary: CriteriaSet {
                    win_drop_range: Bound::between(0.2, 0.5),
                    ordered_win_inequality: true,
                    ..Default::default()
                },
                secondary: None,
            },
        )
    }

    #[test]
    fn scenario_a_sets_flag() {
        let row = scenario_a_row();
        assert!(scenario_config().evaluate(&Snapshot::of(&row)));
    }

    #[test]
    fn scenario_b_rising_checkpoint_unsets_flag() {
        let mut row = scenario_a_row();
        row.win_odds_at_checkpoint = Some(2.05);
        assert!(!scenario_config().evaluate(&Snapshot::of(&row)));
    }

    #[test]
    fn secondary_set_rescues_failed_primary() {
        let mut row = scenario_a_row();
        row.win_odds_at_checkpoint = Some(2.05);
        let config = FlagConfig::new().with_league(
            "A",
            FlagCategory {
                primary: CriteriaSet {
                    win_drop_range: Bound::between(0.2, 0.5),
                    ordered_win_inequality: true,
                    ..Default::default()
                },
                secondary: Some(CriteriaSet {
                    live_win_odds_range: Bound::between(1.5, 1.8),
                    ..Default::default()
                }),
            },
        );
        assert!(config.evaluate(&Snapshot::of(&row)));
    }

    #[test]
    fn empty_sets_never_fire() {
        let row = scenario_a_row();
        let config = FlagConfig::new().with_league(
            "A",
            FlagCategory {
                primary: CriteriaSet::default(),
                secondary: Some(CriteriaSet::default()),
            },
        );
        assert!(!config.evaluate(&Snapshot::of(&row)));
        assert!(config.resolve("A").unwrap().is_vacuous());
    }

    #[test]
    fn missing_input_fails_the_set() {
        let mut row = scenario_a_row();
        row.win_odds_at_checkpoint = None;
        let config = FlagConfig::new().with_league(
            "A",
            FlagCategory {
                primary: CriteriaSet {
                    win_drop_range: Bound::between(0.2, 0.5),
                    checkpoint_win_odds_cap: Some(3.0),
                    ..Default::default()
                },
                secondary: None,
            },
        );
        assert!(!config.evaluate(&Snapshot::of(&row)));
    }

    #[test]
    fn caps_reject_values_above_them() {
        let row = scenario_a_row();
        let capped = |checkpoint: f64, live: f64| CriteriaSet {
            checkpoint_win_odds_cap: Some(checkpoint),
            live_win_odds_cap: Some(live),
            ..Default::default()
        };
        assert!(capped(1.9, 1.7).matches(&Snapshot::of(&row)));
        assert!(!capped(1.85, 1.7).matches(&Snapshot::of(&row)));
        assert!(!capped(1.9, 1.65).matches(&Snapshot::of(&row)));
    }

    #[test]
    fn ungrouped_grade_falls_back_to_default() {
        let mut row = scenario_a_row();
        row.league_grade = "C".into();
        let config = scenario_config().with_default(FlagCategory {
            primary: CriteriaSet {
                live_win_odds_range: Bound::at_most(1.8),
                ..Default::default()
            },
            secondary: None,
        });
        assert!(config.evaluate(&Snapshot::of(&row)));

        let no_default = scenario_config();
        assert!(!no_default.evaluate(&Snapshot::of(&row)));
    }

    #[test]
    fn explicit_entry_shadows_default() {
        let row = scenario_a_row();
        let config = FlagConfig::new()
            .with_league("a", FlagCategory::default())
            .with_default(FlagCategory {
                primary: CriteriaSet {
                    live_win_odds_range: Bound::at_most(1.8),
                    ..Default::default()
                },
                secondary: None,
            });
        assert!(!config.evaluate(&Snapshot::of(&row)));
    }

    #[test]
    fn deserializes_partial_and_malformed_categories() {
        let config: FlagConfig = serde_json::from_value(json!({
            "default": { "primary": { "live_win_odds_cap": "1.8" } },
            "leagues": {
                " s ": { "primary": { "ordered_win_inequality": true } },
                "B": 42
            }
        }))
        .unwrap();

        assert_eq!(config.default.as_ref().unwrap().primary.live_win_odds_cap, Some(1.8));
        assert!(config.resolve("S").unwrap().primary.ordered_win_inequality);
        assert!(config.resolve("B").unwrap().is_vacuous());
    }

    #[test]
    fn malformed_secondary_keeps_primary() {
        let config: FlagConfig = serde_json::from_value(json!({
            "leagues": {
                "A": {
                    "primary": {
                        "win_drop_range": { "min": 0.2, "max": 0.5 },
                        "ordered_win_inequality": true
                    },
                    "secondary": "oops"
                }
            }
        }))
        .unwrap();

        let category = config.resolve("A").unwrap();
        assert_eq!(category.primary.configured_count(), 2);
        assert!(category.secondary.is_none());
        assert!(config.evaluate(&Snapshot::of(&scenario_a_row())));
    }
}
