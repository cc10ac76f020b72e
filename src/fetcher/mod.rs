//! Page fetching: the request/response envelope and a plain HTTP fetcher

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::CrawlConfig;
use crate::error::FetchError;
use crate::models::VariantContext;

const BASE_ID_KEY: &str = "base_id";
const COLOR_CODE_KEY: &str = "color_code";

/// Metadata that travels with a request and comes back with its page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub variant_id: Option<String>,
    pub color_name: Option<String>,
    pub extras: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn for_variant(context: &VariantContext) -> Self {
        let mut extras = BTreeMap::new();
        extras.insert(BASE_ID_KEY.to_string(), context.base_id.clone());
        if let Some(code) = &context.color_code {
            extras.insert(COLOR_CODE_KEY.to_string(), code.clone());
        }
        Self {
            variant_id: Some(context.variant_id.clone()),
            color_name: context.color_name.clone(),
            extras,
        }
    }

    /// The variant identity this request was issued for, if any
    pub fn variant_context(&self) -> Option<VariantContext> {
        let variant_id = self.variant_id.clone()?;
        Some(VariantContext {
            base_id: self
                .extras
                .get(BASE_ID_KEY)
                .cloned()
                .unwrap_or_else(|| variant_id.clone()),
            color_code: self.extras.get(COLOR_CODE_KEY).cloned(),
            color_name: self.color_name.clone(),
            variant_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub context: RequestContext,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            context: RequestContext::default(),
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub body: String,
    pub context: RequestContext,
    /// Gallery images collected by a script-capable fetcher
    pub revealed_images: Vec<String>,
}

/// A failed fetch, still carrying the request so the caller knows what failed
#[derive(Debug, Error)]
#[error("{error}")]
pub struct FetchFailure {
    pub request: PageRequest,
    pub error: FetchError,
}

/// Trait for anything that can turn a request into a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, FetchFailure>;
}

/// Static-HTML fetcher over reqwest with a concurrency cap, a polite delay
/// and exponential-backoff retries
pub struct HttpFetcher {
    client: Client,
    permits: Arc<Semaphore>,
    request_delay: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            request_delay: config.request_delay,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<(String, String), FetchError> {
        let _permit = self.permits.acquire().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        Ok((final_url, body))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, FetchFailure> {
        let mut attempt = 0u32;

        loop {
            match self.fetch_once(&request.url).await {
                Ok((url, body)) => {
                    debug!("Fetched {} ({} bytes)", url, body.len());
                    return Ok(FetchedPage {
                        url,
                        body,
                        context: request.context,
                        revealed_images: Vec::new(),
                    });
                }
                Err(error) if error.is_retriable() && attempt < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(1u32 << attempt.min(16));
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient fetch error, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(FetchFailure { request, error }),
            }
        }
    }
}
