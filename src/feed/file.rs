use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::documents::parse_documents;
use super::provider::FeedSource;
use crate::db::models::OddsRow;

/// Feed backed by a JSON file that an external scraper rewrites in place.
pub struct JsonFileFeed {
    path: PathBuf,
    name: String,
}

impl JsonFileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        JsonFileFeed { path, name }
    }
}

#[async_trait]
impl FeedSource for JsonFileFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rows(&self) -> Result<Vec<OddsRow>> {
        debug!("Reading feed file {}", self.path.display());
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read feed file {}", self.path.display()))?;
        let raw: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Feed file {} is not valid JSON", self.path.display()))?;
        Ok(parse_documents(&raw))
    }
}
