//! Presentation filter: grades rows, drops hidden fixtures, keeps the
//! notable ones and orders them by kick-off.

pub mod identity;

pub use identity::{HiddenList, RowIdentity};

use serde::Serialize;
use tracing::debug;

use crate::db::models::{OddsRow, RowOrigin};
use crate::grading::{grade, tier_label_str, GradeError, GradingOptions};

/// One displayed fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEntry {
    pub identity: RowIdentity,
    pub kickoff: String,
    pub league_name: String,
    pub home_team: String,
    pub away_team: String,
    pub favourite_side: String,
    /// "A+" … "D", or "" when no tier matched
    pub tier: &'static str,
    pub win_flag: bool,
    pub opening_over_line: Option<f64>,
    pub over_odds_at_checkpoint: Option<f64>,
    pub live_over_odds: Option<f64>,
    pub origin: RowOrigin,
}

/// Build the display list for `rows`.
///
/// A row is shown when it is not hidden and either matched a tier or set the
/// win flag. Output is sorted by kick-off string; ties keep input order.
pub fn build_view(
    rows: &[OddsRow],
    options: Option<&GradingOptions>,
    hidden: &HiddenList,
) -> Result<Vec<ViewEntry>, GradeError> {
    let options = options.ok_or(GradeError::MissingOptions)?;

    let mut entries = Vec::new();
    let mut hidden_count = 0usize;
    for row in rows {
        let identity = RowIdentity::of(row);
        if hidden.contains(&identity) {
            hidden_count += 1;
            continue;
        }
        let grades = grade(row, Some(options))?;
        if !grades.is_notable() {
            continue;
        }
        entries.push(ViewEntry {
            identity,
            kickoff: row.kickoff.clone(),
            league_name: row.league_name.clone(),
            home_team: row.home_team.clone(),
            away_team: row.away_team.clone(),
            favourite_side: row.favourite_side.clone(),
            tier: tier_label_str(grades.tier),
            win_flag: grades.win_flag,
            opening_over_line: row.opening_over_line,
            over_odds_at_checkpoint: row.over_odds_at_checkpoint,
            live_over_odds: row.live_over_odds,
            origin: row.origin,
        });
    }

    entries.sort_by(|a, b| a.kickoff.cmp(&b.kickoff));
    debug!(
        "View built: {} shown, {} hidden, {} rows total",
        entries.len(),
        hidden_count,
        rows.len()
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{Bound, CriteriaSet, FlagCategory, FlagConfig, TierConfig, TierCriteria, TierLabel};

    fn options() -> GradingOptions {
        GradingOptions {
            tiers: TierConfig::new().with(
                TierLabel::B,
                TierCriteria {
                    over_drop_range: Bound::between(0.3, 0.8),
                    ..Default::default()
                },
            ),
            flags: FlagConfig::new().with_default(FlagCategory {
                primary: CriteriaSet {
                    win_drop_range: Bound::between(0.2, 0.5),
                    ..Default::default()
                },
                secondary: None,
            }),
        }
    }

    fn row(kickoff: &str, home: &str, over_drop: bool, win_drop: bool) -> OddsRow {
        OddsRow {
            kickoff: kickoff.into(),
            league_grade: "A".into(),
            league_name: "K League".into(),
            home_team: home.into(),
            away_team: "Away".into(),
            opening_over_odds: Some(2.1),
            live_over_odds: Some(if over_drop { 1.6 } else { 2.1 }),
            opening_win_odds: Some(2.0),
            live_win_odds: Some(if win_drop { 1.7 } else { 2.0 }),
            ..Default::default()
        }
    }

    #[test]
    fn keeps_notable_rows_sorted_by_kickoff() {
        let rows = vec![
            row("21:00", "Late", true, false),
            row("18:00", "Dull", false, false),
            row("19:30", "Early", false, true),
        ];
        let view = build_view(&rows, Some(&options()), &HiddenList::default()).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].home_team, "Early");
        assert_eq!(view[0].tier, "");
        assert!(view[0].win_flag);
        assert_eq!(view[1].home_team, "Late");
        assert_eq!(view[1].tier, "B");
        assert!(!view[1].win_flag);
    }

    #[test]
    fn hidden_rows_are_dropped() {
        let rows = vec![row("21:00", "Late", true, true), row("19:30", "Early", true, true)];
        let hidden: HiddenList = [RowIdentity::from_parts("21:00", "A", "K League", "Late")]
            .into_iter()
            .collect();
        let view = build_view(&rows, Some(&options()), &hidden).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].identity.as_str(), "19:30_A_K League_Early");
    }

    #[test]
    fn requires_options() {
        let rows = vec![row("21:00", "Late", true, true)];
        assert_eq!(
            build_view(&rows, None, &HiddenList::default()),
            Err(GradeError::MissingOptions)
        );
    }
}
