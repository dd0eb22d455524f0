use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use odds_grader::config::Config;
use odds_grader::dashboard::{self, AppState};
use odds_grader::db::models::OddsRow;
use odds_grader::db::Database;
use odds_grader::feed::{start_feed_monitor, FeedSource, HttpFeed, JsonFileFeed};
use odds_grader::grading::{grade, GradingOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    if let Some(path) = &config.options_file {
        seed_options(&db, path)?;
    }
    if db.load_options()?.is_none() {
        warn!("No grading options stored; load configuration first (PUT /api/options or --options-file)");
    }

    // Build feed sources
    let mut sources: Vec<Arc<dyn FeedSource>> = Vec::new();
    if let Some(url) = &config.feed_url {
        sources.push(Arc::new(HttpFeed::new(url)?));
    }
    if let Some(path) = &config.feed_path {
        sources.push(Arc::new(JsonFileFeed::new(path)));
    }

    if config.has_feed() {
        info!("Configured {} feed source(s)", sources.len());
        let feed_db = db.clone();
        let poll_interval = Duration::from_secs(config.poll_interval_secs);
        tokio::spawn(async move {
            let mut rx = start_feed_monitor(sources, poll_interval);
            while let Some(batch) = rx.recv().await {
                if let Err(e) = apply_feed_batch(&feed_db, &batch) {
                    error!("Error applying feed batch: {:#}", e);
                }
            }
        });
    } else {
        info!("No feed configured; rows come from manual entry only");
    }

    // Start the dashboard HTTP server
    let app = dashboard::router(AppState { db });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run dashboard server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}

/// Store the options document at `path`, logging any lint warnings.
fn seed_options(db: &Database, path: &str) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Options file {} is not valid JSON", path))?;
    let options = GradingOptions::from_document(&doc)?;
    for w in options.lint() {
        warn!("Options [{}]: {}", w.scope, w.message);
    }
    db.save_options(&options)?;
    info!("Grading options loaded from {}", path);
    Ok(())
}

/// Upsert one feed snapshot and log how it grades.
fn apply_feed_batch(db: &Database, batch: &[OddsRow]) -> Result<()> {
    for row in batch {
        if let Err(e) = db.upsert_feed_row(row) {
            warn!("Failed to upsert feed row {:?}: {:#}", row.external_id, e);
        }
    }

    // Grade what is stored: operators may have re-graded leagues by hand.
    let rows = db.list_rows()?;
    let Some(options) = db.load_options()? else {
        warn!(
            "Feed refreshed {} rows but no grading options are stored; load configuration first",
            batch.len()
        );
        return Ok(());
    };
    let mut tiered = 0usize;
    let mut flagged = 0usize;
    for row in &rows {
        let grades = grade(row, Some(&options))?;
        tiered += grades.tier.is_some() as usize;
        flagged += grades.win_flag as usize;
    }
    info!(
        "Feed refreshed {} rows ({} stored): {} tier-graded, {} win-flagged",
        batch.len(),
        rows.len(),
        tiered,
        flagged
    );
    Ok(())
}
