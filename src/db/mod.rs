use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::grading::GradingOptions;
use crate::view::{HiddenList, RowIdentity};

pub mod models;
use models::*;

const OPTIONS_KEY: &str = "options";

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Fresh in-memory database, used by tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Rows ──────────────────────────────────────────────────────────────────

    /// Insert a new row, returning its ID
    pub fn insert_row(&self, row: &OddsRow) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO odds_rows (
                origin, external_id, kickoff, league_grade, league_name,
                home_team, away_team, favourite_side,
                opening_win_odds, opening_over_line, opening_over_odds,
                win_odds_at_checkpoint, over_odds_at_checkpoint,
                live_win_odds, live_over_odds, updated_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
            params![
                row.origin.as_str(),
                row.external_id,
                row.kickoff,
                row.league_grade,
                row.league_name,
                row.home_team,
                row.away_team,
                row.favourite_side,
                row.opening_win_odds,
                row.opening_over_line,
                row.opening_over_odds,
                row.win_odds_at_checkpoint,
                row.over_odds_at_checkpoint,
                row.live_win_odds,
                row.live_over_odds,
                Utc::now(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Overwrite every editable field of row `id`. Returns false if no such row.
    pub fn update_row(&self, id: i64, row: &OddsRow) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE odds_rows SET
                kickoff=?1, league_grade=?2, league_name=?3, home_team=?4,
                away_team=?5, favourite_side=?6,
                opening_win_odds=?7, opening_over_line=?8, opening_over_odds=?9,
                win_odds_at_checkpoint=?10, over_odds_at_checkpoint=?11,
                live_win_odds=?12, live_over_odds=?13, updated_at=?14
             WHERE id=?15",
            params![
                row.kickoff,
                row.league_grade,
                row.league_name,
                row.home_team,
                row.away_team,
                row.favourite_side,
                row.opening_win_odds,
                row.opening_over_line,
                row.opening_over_odds,
                row.win_odds_at_checkpoint,
                row.over_odds_at_checkpoint,
                row.live_win_odds,
                row.live_over_odds,
                Utc::now(),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete row `id`. Returns false if no such row.
    pub fn delete_row(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM odds_rows WHERE id=?1", params![id])?;
        Ok(changed > 0)
    }

    /// Upsert a feed row keyed by its external ID.
    ///
    /// The league grade is left alone on update: operators may re-grade a
    /// league by hand and the next poll must not undo it.
    pub fn upsert_feed_row(&self, row: &OddsRow) -> Result<()> {
        let external_id = row
            .external_id
            .as_deref()
            .context("feed row has no external id")?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO odds_rows (
                origin, external_id, kickoff, league_grade, league_name,
                home_team, away_team, favourite_side,
                opening_win_odds, opening_over_line, opening_over_odds,
                win_odds_at_checkpoint, over_odds_at_checkpoint,
                live_win_odds, live_over_odds, updated_at
             ) VALUES ('feed',?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
             ON CONFLICT(external_id) DO UPDATE SET
                kickoff=excluded.kickoff,
                league_name=excluded.league_name,
                home_team=excluded.home_team,
                away_team=excluded.away_team,
                favourite_side=excluded.favourite_side,
                opening_win_odds=excluded.opening_win_odds,
                opening_over_line=excluded.opening_over_line,
                opening_over_odds=excluded.opening_over_odds,
                win_odds_at_checkpoint=excluded.win_odds_at_checkpoint,
                over_odds_at_checkpoint=excluded.over_odds_at_checkpoint,
                live_win_odds=excluded.live_win_odds,
                live_over_odds=excluded.live_over_odds,
                updated_at=excluded.updated_at",
            params![
                external_id,
                row.kickoff,
                row.league_grade,
                row.league_name,
                row.home_team,
                row.away_team,
                row.favourite_side,
                row.opening_win_odds,
                row.opening_over_line,
                row.opening_over_odds,
                row.win_odds_at_checkpoint,
                row.over_odds_at_checkpoint,
                row.live_win_odds,
                row.live_over_odds,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// All rows (manual and feed), ordered by kickoff
    pub fn list_rows(&self) -> Result<Vec<OddsRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, origin, external_id, kickoff, league_grade, league_name,
                    home_team, away_team, favourite_side,
                    opening_win_odds, opening_over_line, opening_over_odds,
                    win_odds_at_checkpoint, over_odds_at_checkpoint,
                    live_win_odds, live_over_odds, updated_at
             FROM odds_rows ORDER BY kickoff ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Grading options ───────────────────────────────────────────────────────

    /// Stored grading options, or `None` if nothing was ever saved
    pub fn load_options(&self) -> Result<Option<GradingOptions>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key=?1",
                params![OPTIONS_KEY],
                |r| r.get(0),
            )
            .optional()?;
        drop(conn);
        let Some(raw) = raw else {
            return Ok(None);
        };
        let doc: serde_json::Value =
            serde_json::from_str(&raw).context("stored grading options are not valid JSON")?;
        Ok(Some(GradingOptions::from_document(&doc)?))
    }

    /// Replace the stored grading options
    pub fn save_options(&self, options: &GradingOptions) -> Result<()> {
        let json = serde_json::to_string(options)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            params![OPTIONS_KEY, json, Utc::now()],
        )?;
        Ok(())
    }

    // ── Hide-list ─────────────────────────────────────────────────────────────

    pub fn load_hidden(&self) -> Result<HiddenList> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM hidden_rows")?;
        let keys = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys.iter().map(|k| RowIdentity::from_key(k)).collect())
    }

    /// Add a fixture to the hide-list (no-op if already hidden)
    pub fn hide(&self, id: &RowIdentity) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO hidden_rows (key, hidden_at) VALUES (?1, ?2)",
            params![id.as_str(), Utc::now()],
        )?;
        Ok(())
    }

    /// Remove a fixture from the hide-list. Returns false if it was not hidden.
    pub fn unhide(&self, id: &RowIdentity) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM hidden_rows WHERE key=?1", params![id.as_str()])?;
        Ok(changed > 0)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<OddsRow> {
    let origin: String = row.get(1)?;
    Ok(OddsRow {
        id: row.get(0)?,
        origin: RowOrigin::from_str_lossy(&origin),
        external_id: row.get(2)?,
        kickoff: row.get(3)?,
        league_grade: row.get(4)?,
        league_name: row.get(5)?,
        home_team: row.get(6)?,
        away_team: row.get(7)?,
        favourite_side: row.get(8)?,
        opening_win_odds: row.get(9)?,
        opening_over_line: row.get(10)?,
        opening_over_odds: row.get(11)?,
        win_odds_at_checkpoint: row.get(12)?,
        over_odds_at_checkpoint: row.get(13)?,
        live_win_odds: row.get(14)?,
        live_over_odds: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS odds_rows (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    origin                  TEXT    NOT NULL DEFAULT 'manual',
    external_id             TEXT    UNIQUE,
    kickoff                 TEXT    NOT NULL DEFAULT '',
    league_grade            TEXT    NOT NULL DEFAULT '',
    league_name             TEXT    NOT NULL DEFAULT '',
    home_team               TEXT    NOT NULL DEFAULT '',
    away_team               TEXT    NOT NULL DEFAULT '',
    favourite_side          TEXT    NOT NULL DEFAULT '',
    opening_win_odds        REAL,
    opening_over_line       REAL,
    opening_over_odds       REAL,
    win_odds_at_checkpoint  REAL,
    over_odds_at_checkpoint REAL,
    live_win_odds           REAL,
    live_over_odds          REAL,
    updated_at              TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key         TEXT    PRIMARY KEY,
    value       TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS hidden_rows (
    key         TEXT    PRIMARY KEY,
    hidden_at   TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_odds_rows_kickoff ON odds_rows(kickoff);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{Bound, TierCriteria, TierLabel};

    fn feed_row(external_id: &str, live_win: f64) -> OddsRow {
        OddsRow {
            origin: RowOrigin::Feed,
            external_id: Some(external_id.into()),
            kickoff: "20:00".into(),
            league_grade: "B".into(),
            league_name: "Serie A".into(),
            home_team: "Inter".into(),
            away_team: "Milan".into(),
            opening_win_odds: Some(2.0),
            live_win_odds: Some(live_win),
            ..Default::default()
        }
    }

    #[test]
    fn manual_rows_insert_update_delete() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_row(&OddsRow {
                kickoff: "19:00".into(),
                home_team: "Arsenal".into(),
                opening_win_odds: Some(2.0),
                ..Default::default()
            })
            .unwrap();

        let rows = db.list_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, Some(id));
        assert_eq!(rows[0].origin, RowOrigin::Manual);
        assert_eq!(rows[0].opening_win_odds, Some(2.0));
        assert_eq!(rows[0].live_win_odds, None);

        let mut edited = rows[0].clone();
        edited.live_win_odds = Some(1.7);
        assert!(db.update_row(id, &edited).unwrap());
        assert_eq!(db.list_rows().unwrap()[0].live_win_odds, Some(1.7));

        assert!(db.delete_row(id).unwrap());
        assert!(!db.delete_row(id).unwrap());
        assert!(db.list_rows().unwrap().is_empty());
    }

    #[test]
    fn feed_upsert_keeps_operator_league_grade() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_feed_row(&feed_row("m1", 1.9)).unwrap();

        let mut stored = db.list_rows().unwrap().remove(0);
        stored.league_grade = "S".into();
        db.update_row(stored.id.unwrap(), &stored).unwrap();

        db.upsert_feed_row(&feed_row("m1", 1.7)).unwrap();
        let rows = db.list_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].origin, RowOrigin::Feed);
        assert_eq!(rows[0].league_grade, "S");
        assert_eq!(rows[0].live_win_odds, Some(1.7));
    }

    #[test]
    fn feed_upsert_requires_external_id() {
        let db = Database::open_in_memory().unwrap();
        let mut row = feed_row("m1", 1.9);
        row.external_id = None;
        assert!(db.upsert_feed_row(&row).is_err());
    }

    #[test]
    fn options_round_trip_and_absence() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_options().unwrap().is_none());

        let mut options = GradingOptions::default();
        options.tiers.insert(
            TierLabel::A,
            TierCriteria {
                over_drop_range: Bound::between(0.3, 0.8),
                ..Default::default()
            },
        );
        db.save_options(&options).unwrap();
        assert_eq!(db.load_options().unwrap(), Some(options.clone()));

        db.save_options(&GradingOptions::default()).unwrap();
        assert_eq!(db.load_options().unwrap(), Some(GradingOptions::default()));
    }

    #[test]
    fn hide_list_add_and_remove() {
        let db = Database::open_in_memory().unwrap();
        let id = RowIdentity::from_parts("20:00", "B", "Serie A", "Inter");
        db.hide(&id).unwrap();
        db.hide(&id).unwrap();

        let hidden = db.load_hidden().unwrap();
        assert_eq!(hidden.len(), 1);
        assert!(hidden.hides(&feed_row("m1", 1.9)));

        assert!(db.unhide(&id).unwrap());
        assert!(!db.unhide(&id).unwrap());
        assert!(db.load_hidden().unwrap().is_empty());
    }
}
