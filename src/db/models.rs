use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Where a row came from: typed in by an operator or pulled from a feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOrigin {
    #[default]
    Manual,
    Feed,
}

impl RowOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowOrigin::Manual => "manual",
            RowOrigin::Feed => "feed",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "feed" => RowOrigin::Feed,
            _ => RowOrigin::Manual,
        }
    }
}

/// One fixture's odds snapshot: opening line, 75th-minute checkpoint and live.
///
/// Every numeric field is independently optional; a blank or non-numeric
/// input is stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsRow {
    pub id: Option<i64>,
    pub origin: RowOrigin,
    /// Feed document ID (feed rows only)
    pub external_id: Option<String>,
    /// Kick-off time, "HH:MM"
    pub kickoff: String,
    /// League grade: A / B / C / S
    pub league_grade: String,
    pub league_name: String,
    pub home_team: String,
    pub away_team: String,
    /// Which side the market favours (home / away)
    pub favourite_side: String,

    #[serde(deserialize_with = "lenient_f64")]
    pub opening_win_odds: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub opening_over_line: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub opening_over_odds: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub win_odds_at_checkpoint: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub over_odds_at_checkpoint: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub live_win_odds: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub live_over_odds: Option<f64>,

    pub updated_at: DateTime<Utc>,
}

impl OddsRow {
    /// Opening minus live win price, rounded to 2 decimals.
    pub fn win_drop(&self) -> Option<f64> {
        drop_between(self.opening_win_odds, self.live_win_odds)
    }

    /// Opening minus live over price, rounded to 2 decimals.
    pub fn over_drop(&self) -> Option<f64> {
        drop_between(self.opening_over_odds, self.live_over_odds)
    }
}

fn drop_between(opening: Option<f64>, later: Option<f64>) -> Option<f64> {
    let drop = opening? - later?;
    Some((drop * 100.0).round() / 100.0)
}

/// Coerce a loosely-typed JSON scalar to a finite number.
///
/// Accepts numbers and numeric strings (surrounding whitespace ignored);
/// everything else, including blanks, is absent.
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// Coerce a loosely-typed JSON scalar to a trimmed string.
pub fn parse_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Serde adapter over [`parse_number`].
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value))
}

/// Serde adapter for switches that may arrive as booleans or strings.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}
