//! Crawl settings and their command-line surface

use std::time::Duration;

use clap::Args;

use crate::gallery::RevealConfig;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Settings shared by the fetcher and the crawler
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum in-flight requests
    pub concurrency: usize,
    /// Polite delay before each request
    pub request_delay: Duration,
    pub timeout: Duration,
    /// Additional attempts after the first for transient failures
    pub max_retries: u32,
    /// Base of the exponential backoff between attempts
    pub retry_backoff: Duration,
    pub user_agent: String,
    /// Click budget for script-rendered image galleries
    pub max_reveal_clicks: usize,
    /// Wait after each gallery click
    pub reveal_settle_delay: Duration,
    /// Stop after this many product pages
    pub page_limit: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            request_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_reveal_clicks: 35,
            reveal_settle_delay: Duration::from_secs(2),
            page_limit: None,
        }
    }
}

impl CrawlConfig {
    pub fn reveal_config(&self) -> RevealConfig {
        RevealConfig {
            max_clicks: self.max_reveal_clicks,
            settle_delay: self.reveal_settle_delay,
            ..RevealConfig::default()
        }
    }
}

/// Fetcher and crawl options; every flag also reads a `CATALOG_*` variable
#[derive(Debug, Clone, Args)]
pub struct CrawlArgs {
    /// Maximum concurrent requests
    #[arg(long, env = "CATALOG_CONCURRENCY", default_value_t = 10)]
    pub concurrency: usize,

    /// Delay before each request, in milliseconds
    #[arg(long, env = "CATALOG_DELAY_MS", default_value_t = 1000)]
    pub delay_ms: u64,

    /// Request timeout, in seconds
    #[arg(long, env = "CATALOG_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Retries for 408/429/5xx responses and network errors
    #[arg(long, env = "CATALOG_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    #[arg(long, env = "CATALOG_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Only crawl the first N product pages
    #[arg(long)]
    pub limit: Option<usize>,
}

impl CrawlArgs {
    pub fn to_config(&self) -> CrawlConfig {
        CrawlConfig {
            concurrency: self.concurrency.max(1),
            request_delay: Duration::from_millis(self.delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            user_agent: self.user_agent.clone(),
            page_limit: self.limit,
            ..CrawlConfig::default()
        }
    }
}
