//! Grading engine: tier grade and win flag for one odds row.
//!
//! Both evaluators are pure functions of `(row, options)`. Options are
//! passed in on every call; the engine keeps no state between calls.

pub mod flag;
pub mod options;
pub mod ordering;
pub mod range;
pub mod tier;

pub use flag::{CriteriaSet, FlagCategory, FlagConfig};
pub use options::{ConfigWarning, GradingOptions};
pub use range::Bound;
pub use tier::{tier_label_str, TierConfig, TierCriteria, TierLabel};

use serde::Serialize;
use thiserror::Error;

use crate::db::models::OddsRow;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradeError {
    #[error("grading options not loaded; load configuration first")]
    MissingOptions,
}

/// A row together with its derived drops, computed once and shared by both
/// evaluators.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub row: &'a OddsRow,
    pub win_drop: Option<f64>,
    pub over_drop: Option<f64>,
}

impl<'a> Snapshot<'a> {
    pub fn of(row: &'a OddsRow) -> Self {
        Snapshot {
            row,
            win_drop: row.win_drop(),
            over_drop: row.over_drop(),
        }
    }
}

/// Both classifications for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grades {
    pub tier: Option<TierLabel>,
    pub win_flag: bool,
}

impl Grades {
    /// Shown when a tier matched or the flag is set.
    pub fn is_notable(&self) -> bool {
        self.tier.is_some() || self.win_flag
    }
}

pub fn grade_tier(
    row: &OddsRow,
    options: Option<&GradingOptions>,
) -> Result<Option<TierLabel>, GradeError> {
    let options = options.ok_or(GradeError::MissingOptions)?;
    Ok(options.tiers.evaluate(&Snapshot::of(row)))
}

pub fn grade_flag(row: &OddsRow, options: Option<&GradingOptions>) -> Result<bool, GradeError> {
    let options = options.ok_or(GradeError::MissingOptions)?;
    Ok(options.flags.evaluate(&Snapshot::of(row)))
}

/// Tier and flag together, sharing one [`Snapshot`].
pub fn grade(row: &OddsRow, options: Option<&GradingOptions>) -> Result<Grades, GradeError> {
    let options = options.ok_or(GradeError::MissingOptions)?;
    let snap = Snapshot::of(row);
    Ok(Grades {
        tier: options.tiers.evaluate(&snap),
        win_flag: options.flags.evaluate(&snap),
    })
}

/// League grades compare trimmed and upper-cased.
pub(crate) fn normalize_grade(grade: &str) -> String {
    grade.trim().to_uppercase()
}
