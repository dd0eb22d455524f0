use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::db::models::{parse_text, OddsRow, RowOrigin};
use crate::db::Database;
use crate::grading::{grade, tier_label_str, ConfigWarning, GradeError, GradingOptions};
use crate::view::{build_view, RowIdentity};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}

fn precondition(e: GradeError) -> ApiError {
    (StatusCode::PRECONDITION_FAILED, e.to_string())
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/view", get(view_handler))
        .route("/api/rows", get(rows_handler).post(create_row_handler))
        .route("/api/rows/:id", put(update_row_handler).delete(delete_row_handler))
        .route("/api/options", get(get_options_handler).put(put_options_handler))
        .route("/api/hidden", get(hidden_handler).post(hide_handler))
        .route("/api/hidden/:key", delete(unhide_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve the embedded view page.
async fn index_handler() -> impl IntoResponse {
    Html(VIEW_HTML)
}

/// GET /api/view — graded, filtered and sorted fixtures
async fn view_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_rows().map_err(internal)?;
    let options = state.db.load_options().map_err(internal)?;
    let hidden = state.db.load_hidden().map_err(internal)?;
    build_view(&rows, options.as_ref(), &hidden)
        .map(Json)
        .map_err(precondition)
}

#[derive(Debug, Serialize)]
struct GradedRow {
    #[serde(flatten)]
    row: OddsRow,
    identity: RowIdentity,
    win_drop: Option<f64>,
    over_drop: Option<f64>,
    /// `None` when no options are loaded
    tier: Option<&'static str>,
    win_flag: Option<bool>,
}

#[derive(Debug, Serialize)]
struct RowsResponse {
    rows: Vec<GradedRow>,
    /// Set when grading could not run
    warning: Option<String>,
}

/// GET /api/rows — every row with its drops and grades
async fn rows_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_rows().map_err(internal)?;
    let options = state.db.load_options().map_err(internal)?;

    let warning = options
        .is_none()
        .then(|| GradeError::MissingOptions.to_string());
    let rows = rows
        .into_iter()
        .map(|row| {
            let grades = grade(&row, options.as_ref()).ok();
            GradedRow {
                identity: RowIdentity::of(&row),
                win_drop: row.win_drop(),
                over_drop: row.over_drop(),
                tier: grades.map(|g| tier_label_str(g.tier)),
                win_flag: grades.map(|g| g.win_flag),
                row,
            }
        })
        .collect();

    Ok(Json(RowsResponse { rows, warning }))
}

#[derive(Debug, Serialize, Deserialize)]
struct IdResponse {
    id: i64,
}

/// POST /api/rows — add a manually entered row
async fn create_row_handler(
    State(state): State<Arc<AppState>>,
    Json(mut row): Json<OddsRow>,
) -> Result<impl IntoResponse, ApiError> {
    row.origin = RowOrigin::Manual;
    row.external_id = None;
    let id = state.db.insert_row(&row).map_err(internal)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

/// PUT /api/rows/:id
async fn update_row_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(row): Json<OddsRow>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.update_row(id, &row).map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("row {} not found", id)))
    }
}

/// DELETE /api/rows/:id
async fn delete_row_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.delete_row(id).map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("row {} not found", id)))
    }
}

/// GET /api/options
async fn get_options_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.load_options().map_err(internal)? {
        Some(options) => Ok(Json(options)),
        None => Err(precondition(GradeError::MissingOptions)),
    }
}

#[derive(Debug, Serialize)]
struct OptionsSaved {
    warnings: Vec<ConfigWarning>,
}

/// PUT /api/options — store a canonical or legacy options document
async fn put_options_handler(
    State(state): State<Arc<AppState>>,
    Json(doc): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let options = GradingOptions::from_document(&doc)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{:#}", e)))?;
    state.db.save_options(&options).map_err(internal)?;

    let warnings = options.lint();
    for w in &warnings {
        warn!("Options [{}]: {}", w.scope, w.message);
    }
    info!("Grading options saved ({} warnings)", warnings.len());
    Ok(Json(OptionsSaved { warnings }))
}

/// GET /api/hidden
async fn hidden_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .load_hidden()
        .map(|h| Json(h.keys()))
        .map_err(internal)
}

/// Either a ready-made key or the four identifying fields.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HideRequest {
    Key {
        key: String,
    },
    Parts {
        #[serde(default)]
        kickoff: Value,
        #[serde(default)]
        league_grade: Value,
        #[serde(default)]
        league_name: Value,
        #[serde(default)]
        home_team: Value,
    },
}

impl HideRequest {
    fn identity(&self) -> Option<RowIdentity> {
        let id = match self {
            HideRequest::Key { key } => RowIdentity::from_key(key),
            HideRequest::Parts {
                kickoff,
                league_grade,
                league_name,
                home_team,
            } => RowIdentity::from_parts(
                &parse_text(kickoff),
                &parse_text(league_grade),
                &parse_text(league_name),
                &parse_text(home_team),
            ),
        };
        id.as_str().chars().any(|c| c != '_').then_some(id)
    }
}

/// POST /api/hidden
async fn hide_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HideRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req
        .identity()
        .ok_or((StatusCode::BAD_REQUEST, "empty row identity".to_string()))?;
    state.db.hide(&id).map_err(internal)?;
    info!("Hidden {}", id);
    Ok((StatusCode::CREATED, Json(id)))
}

/// DELETE /api/hidden/:key
async fn unhide_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = RowIdentity::from_key(&key);
    if state.db.unhide(&id).map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("'{}' is not hidden", id)))
    }
}

/// Embedded single-file view page (HTML + CSS + JS)
const VIEW_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Odds Grader</title>
<style>
  :root { --bg: #0f1117; --card: #1a1d27; --border: #2a2d3a; --text: #e0e0e0; --muted: #8888aa; }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  main { padding: 1.5rem 2rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-weight: 700; border-bottom: 1px solid #1e2130; }
  td.fav { background: #3a3d4a; }
  td.grade { font-size: 1.5em; font-weight: 900; color: #000; }
  .g-a { background: #ff6b6b; } .g-b { background: #ffd93d; } .g-c { background: #4d96ff; } .g-d { background: #95e1d3; }
  td.flag { background: #d0d0d0; color: #000; font-size: 1.5em; font-weight: 900; }
  .warning { padding: 2rem; text-align: center; color: #ff9800; }
  .count { margin-left: auto; color: var(--muted); font-size: .85rem; }
</style>
</head>
<body>
<header>
  <h1>Odds Grader</h1>
  <span class="count" id="count"></span>
</header>
<main>
  <div class="panel">
    <table>
      <thead><tr><th>Time</th><th>League</th><th>Home</th><th>Away</th><th>Over grade</th><th>Win</th></tr></thead>
      <tbody id="view-tbody"><tr><td colspan="6" class="warning">Loading…</td></tr></tbody>
    </table>
  </div>
</main>
<script>
const esc = s => String(s ?? '').replace(/[&<>"]/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;'}[c]));
const num = v => v == null ? '' : v;

async function refreshView() {
  const tbody = document.getElementById('view-tbody');
  const r = await fetch('/api/view');
  if (!r.ok) {
    tbody.innerHTML = `<tr><td colspan="6" class="warning">${esc(await r.text())}</td></tr>`;
    document.getElementById('count').textContent = '';
    return;
  }
  const entries = await r.json();
  tbody.innerHTML = entries.map(e => {
    const cls = e.tier ? 'grade g-' + e.tier[0].toLowerCase() : '';
    const side = (e.favourite_side || '').toLowerCase();
    return `<tr>
      <td>${esc(e.kickoff)}</td>
      <td>${esc(e.league_name)}</td>
      <td class="${side === 'home' ? 'fav' : ''}">${esc(e.home_team)}</td>
      <td class="${side === 'away' ? 'fav' : ''}">${esc(e.away_team)}</td>
      <td class="${cls}">${e.tier ? esc(e.tier) + ' ( ' + num(e.opening_over_line) + ' / ' + num(e.live_over_odds) + ' )' : ''}</td>
      <td class="${e.win_flag ? 'flag' : ''}">${e.win_flag ? '✓ ( ' + num(e.over_odds_at_checkpoint) + ' )' : ''}</td>
    </tr>`;
  }).join('');
  document.getElementById('count').textContent = `${entries.length} fixtures shown`;
}

refreshView();
setInterval(refreshView, 60000);
</script>
</body>
</html>
"#;
