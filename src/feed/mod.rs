pub mod documents;
pub mod file;
pub mod http;
pub mod provider;

pub use file::JsonFileFeed;
pub use http::HttpFeed;
pub use provider::FeedSource;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::db::models::OddsRow;

/// Merge per-source batches by external ID. Later sources win on conflict.
fn merge_batches(batches: Vec<(String, Vec<OddsRow>)>) -> Vec<OddsRow> {
    let mut by_id: HashMap<String, OddsRow> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for (_, rows) in batches {
        for row in rows {
            let Some(id) = row.external_id.clone() else {
                continue;
            };
            if by_id.insert(id.clone(), row).is_none() {
                order.push(id);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

/// Spawns a background task that polls every feed source concurrently at
/// `poll_interval` and sends the merged snapshot through the returned channel.
///
/// Empty cycles (all sources failed or returned nothing) send nothing.
pub fn start_feed_monitor(
    sources: Vec<Arc<dyn FeedSource>>,
    poll_interval: Duration,
) -> mpsc::Receiver<Vec<OddsRow>> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let source_names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        info!(
            "Feed monitor started ({} sources: {:?}, interval={:?})",
            sources.len(),
            source_names,
            poll_interval
        );

        let source_timeout = poll_interval.min(Duration::from_secs(15));
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let fetches: Vec<_> = sources
                .iter()
                .map(|s| {
                    let s = Arc::clone(s);
                    async move {
                        let res = tokio::time::timeout(source_timeout, s.fetch_rows()).await;
                        let out = match res {
                            Ok(result) => result,
                            Err(_) => Err(anyhow::anyhow!("timed out after {:?}", source_timeout)),
                        };
                        (s.name().to_string(), out)
                    }
                })
                .collect();

            let results = futures_util::future::join_all(fetches).await;

            let mut batches = Vec::new();
            for (name, result) in results {
                match result {
                    Ok(rows) => batches.push((name, rows)),
                    Err(e) => warn!("Feed source '{}' failed: {:#}", name, e),
                }
            }

            let merged = merge_batches(batches);
            if merged.is_empty() {
                continue;
            }
            if tx.send(merged).await.is_err() {
                error!("Feed consumer dropped; stopping feed monitor");
                break;
            }
        }
    });

    rx
}
