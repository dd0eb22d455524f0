use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::OddsRow;

/// Trait that every automated row supplier must implement.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Return the current snapshot of every fixture the source knows about.
    async fn fetch_rows(&self) -> Result<Vec<OddsRow>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
