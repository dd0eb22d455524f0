use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::models::OddsRow;

/// Hide-list key for a fixture: kickoff, league grade, league name and home
/// team, each trimmed, joined with `_`.
///
/// Every producer and consumer of hide-list keys goes through this type so
/// the join format cannot drift.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct RowIdentity(String);

const SEPARATOR: &str = "_";

impl RowIdentity {
    pub fn from_parts(kickoff: &str, league_grade: &str, league_name: &str, home_team: &str) -> Self {
        let parts = [kickoff, league_grade, league_name, home_team].map(str::trim);
        RowIdentity(parts.join(SEPARATOR))
    }

    pub fn of(row: &OddsRow) -> Self {
        Self::from_parts(&row.kickoff, &row.league_grade, &row.league_name, &row.home_team)
    }

    /// Re-normalise a key read back from storage or a request.
    pub fn from_key(key: &str) -> Self {
        RowIdentity(key.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RowIdentity {
    fn from(key: String) -> Self {
        RowIdentity::from_key(&key)
    }
}

impl From<RowIdentity> for String {
    fn from(id: RowIdentity) -> Self {
        id.0
    }
}

/// Operator-maintained set of fixtures excluded from the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenList {
    ids: HashSet<RowIdentity>,
}

impl HiddenList {
    pub fn contains(&self, id: &RowIdentity) -> bool {
        self.ids.contains(id)
    }

    pub fn hides(&self, row: &OddsRow) -> bool {
        self.contains(&RowIdentity::of(row))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<RowIdentity> {
        let mut keys: Vec<_> = self.ids.iter().cloned().collect();
        keys.sort();
        keys
    }
}

impl FromIterator<RowIdentity> for HiddenList {
    fn from_iter<I: IntoIterator<Item = RowIdentity>>(iter: I) -> Self {
        HiddenList {
            ids: iter.into_iter().collect(),
        }
    }
}
