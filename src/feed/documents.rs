//! Parsing of auto-match documents as published by the odds scraper.
//!
//! Field names follow the scraper's schema (`favOddInitial`, `oddWinAt75`, …).
//! Prices may arrive as numbers or strings; anything unparseable is blank.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::db::models::{parse_number, parse_text, OddsRow, RowOrigin};

/// Parse a document list: either a bare array or `{ "matches": [...] }`.
/// Documents without an `id` are skipped.
pub fn parse_documents(raw: &Value) -> Vec<OddsRow> {
    let docs = match raw {
        Value::Array(a) => a.as_slice(),
        other => match other.get("matches").and_then(Value::as_array) {
            Some(a) => a.as_slice(),
            None => return vec![],
        },
    };

    docs.iter()
        .filter_map(|doc| {
            let row = parse_document(doc);
            if row.is_none() {
                debug!("Skipping feed document without id");
            }
            row
        })
        .collect()
}

/// Map one document onto an [`OddsRow`]. `None` if it carries no `id`.
pub fn parse_document(doc: &Value) -> Option<OddsRow> {
    let external_id = parse_text(doc.get("id")?);
    if external_id.is_empty() {
        return None;
    }
    let text = |key: &str| doc.get(key).map(parse_text).unwrap_or_default();
    let number = |key: &str| doc.get(key).and_then(parse_number);

    // The scraper has shipped both spellings of the away-team field.
    let away_team = match text("awayTeam") {
        t if t.is_empty() => text("awwayTeam"),
        t => t,
    };

    Some(OddsRow {
        id: None,
        origin: RowOrigin::Feed,
        external_id: Some(external_id),
        kickoff: kickoff_from_start(&text("startKST")),
        league_grade: text("leagueGrade"),
        league_name: text("leagueName"),
        home_team: text("homeTeam"),
        away_team,
        favourite_side: text("favSide"),
        opening_win_odds: number("favOddInitial"),
        opening_over_line: number("baseOverLine"),
        opening_over_odds: number("baseOverOddInitial"),
        win_odds_at_checkpoint: number("oddWinAt75"),
        over_odds_at_checkpoint: number("oddOverAt75"),
        live_win_odds: number("oddWinLive"),
        live_over_odds: number("oddOverLive"),
        updated_at: Utc::now(),
    })
}

/// "2025-03-01T19:30:00+09:00" → "19:30". Shorter inputs give "".
/// `HH:MM` from an ISO timestamp; a truncated timestamp yields what is there.
fn kickoff_from_start(start: &str) -> String {
    start.chars().skip(11).take(5).collect()
}
