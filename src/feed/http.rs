use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::documents::parse_documents;
use super::provider::FeedSource;
use crate::db::models::OddsRow;

/// Feed that GETs the auto-match document list over HTTP.
pub struct HttpFeed {
    http: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpFeed {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch_rows(&self) -> Result<Vec<OddsRow>> {
        debug!("Fetching feed documents from {}", self.url);

        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("Feed request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Feed error: {}", resp.status());
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse feed response")?;

        Ok(parse_documents(&raw))
    }
}
