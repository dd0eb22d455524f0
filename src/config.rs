use clap::Parser;
use std::path::Path;

/// Odds-movement grading service
#[derive(Parser, Debug, Clone)]
#[command(name = "odds-grader", version, about)]
pub struct Config {
    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "odds-grader.db")]
    pub database_path: String,

    /// URL serving the auto-match document list (polled)
    #[arg(long, env = "FEED_URL")]
    pub feed_url: Option<String>,

    /// Local JSON file holding the auto-match document list (polled)
    #[arg(long, env = "FEED_PATH")]
    pub feed_path: Option<String>,

    /// Feed polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "60")]
    pub poll_interval_secs: u64,

    /// Grading options JSON to store at startup (canonical or legacy layout)
    #[arg(long, env = "OPTIONS_FILE")]
    pub options_file: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        if let Some(raw) = &self.feed_url {
            let url = url::Url::parse(raw)
                .map_err(|e| anyhow::anyhow!("FEED_URL '{}' is not a valid URL: {}", raw, e))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("FEED_URL must use http or https, got '{}'", url.scheme());
            }
        }
        if let Some(path) = &self.options_file {
            if !Path::new(path).is_file() {
                anyhow::bail!("OPTIONS_FILE '{}' does not exist", path);
            }
        }
        Ok(())
    }

    pub fn has_feed(&self) -> bool {
        self.feed_url.is_some() || self.feed_path.is_some()
    }
}
