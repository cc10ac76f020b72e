//! Interactive "reveal more images" loop for script-rendered galleries.
//!
//! A browser integration implements [`GalleryBrowser`] and [`GalleryDriver`];
//! [`RevealingFetcher`] wraps any [`PageFetcher`] and, for product pages, runs
//! [`reveal_images`] to click through the carousel and accumulate image
//! sources until the set stops growing or the click budget runs out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::CrawlConfig;
use crate::fetcher::{FetchFailure, FetchedPage, PageFetcher, PageRequest};
use crate::traits::{ResourcePolicy, SiteProfile};

/// Opens a live page with the site's subresource rules applied
#[async_trait]
pub trait GalleryBrowser: Send + Sync {
    async fn open(&self, url: &str, resources: &ResourcePolicy) -> Result<Box<dyn GalleryDriver>>;
}

/// Minimal browser surface needed to page through a carousel
#[async_trait]
pub trait GalleryDriver: Send {
    /// Trigger the carousel's "next" control
    async fn advance(&mut self) -> Result<()>;

    /// `src` values of the gallery images currently in the DOM
    async fn visible_sources(&mut self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct RevealConfig {
    /// Safety bound on the number of clicks
    pub max_clicks: usize,
    /// The set must hold more than this many images before it may be called stable
    pub min_images: usize,
    /// Consecutive clicks without growth that count as stable
    pub patience: usize,
    /// Wait after each click for the new slide to load
    pub settle_delay: Duration,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            max_clicks: 35,
            min_images: 5,
            patience: 3,
            settle_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    /// Still clicking; `streak` clicks in a row added nothing
    Iterating { streak: usize },
    /// Enough images and no growth for `patience` clicks
    Stable,
    /// Click budget spent
    Exhausted,
}

/// Stop-condition bookkeeping, separate from any browser so it can be driven
/// by plain counts.
#[derive(Debug, Clone)]
pub struct RevealTracker {
    config: RevealConfig,
    clicks: usize,
    last_count: usize,
    state: RevealState,
}

impl RevealTracker {
    pub fn new(config: RevealConfig) -> Self {
        Self {
            config,
            clicks: 0,
            last_count: 0,
            state: RevealState::Iterating { streak: 0 },
        }
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn clicks(&self) -> usize {
        self.clicks
    }

    /// Records the accumulated set size after one click
    pub fn observe(&mut self, count: usize) -> RevealState {
        let RevealState::Iterating { streak } = self.state else {
            return self.state;
        };

        self.clicks += 1;
        let streak = if count == self.last_count { streak + 1 } else { 0 };
        self.last_count = count;

        self.state = if count > self.config.min_images && streak >= self.config.patience {
            RevealState::Stable
        } else if self.clicks >= self.config.max_clicks {
            RevealState::Exhausted
        } else {
            RevealState::Iterating { streak }
        };
        self.state
    }
}

/// Clicks through a gallery and returns every distinct image source seen.
///
/// Errors from the driver end the interaction and yield an empty set.
pub async fn reveal_images<D: GalleryDriver + ?Sized>(
    driver: &mut D,
    config: &RevealConfig,
) -> HashSet<String> {
    match drive(driver, config).await {
        Ok(images) => images,
        Err(e) => {
            error!("An error occurred during carousel interaction: {}", e);
            HashSet::new()
        }
    }
}

async fn drive<D: GalleryDriver + ?Sized>(driver: &mut D, config: &RevealConfig) -> Result<HashSet<String>> {
    info!("Starting carousel interaction to load all images...");
    let mut collected = HashSet::new();
    let mut tracker = RevealTracker::new(config.clone());

    loop {
        driver.advance().await?;
        tokio::time::sleep(config.settle_delay).await;

        for src in driver.visible_sources().await? {
            let src = src.trim();
            if !src.is_empty() && !src.starts_with("data:") {
                collected.insert(src.to_string());
            }
        }
        info!("Click {}: Total unique images found: {}", tracker.clicks() + 1, collected.len());

        match tracker.observe(collected.len()) {
            RevealState::Iterating { .. } => {}
            RevealState::Stable => {
                info!("Carousel seems fully loaded with {} images. Stopping.", collected.len());
                break;
            }
            RevealState::Exhausted => {
                warn!(
                    "Reached max clicks ({}). Proceeding with {} images.",
                    config.max_clicks,
                    collected.len()
                );
                break;
            }
        }
    }

    info!("Finished carousel interaction. Collected {} unique images.", collected.len());
    Ok(collected)
}

/// Fetcher that adds the images revealed by a product page's live gallery
/// to what the inner fetcher returned
pub struct RevealingFetcher {
    inner: Arc<dyn PageFetcher>,
    browser: Arc<dyn GalleryBrowser>,
    product_pattern: Regex,
    resources: ResourcePolicy,
    config: RevealConfig,
}

impl RevealingFetcher {
    pub fn new(
        inner: Arc<dyn PageFetcher>,
        browser: Arc<dyn GalleryBrowser>,
        profile: &SiteProfile,
        config: &CrawlConfig,
    ) -> Self {
        Self {
            inner,
            browser,
            product_pattern: profile.product_pattern.clone(),
            resources: profile.resources.clone(),
            config: config.reveal_config(),
        }
    }
}

#[async_trait]
impl PageFetcher for RevealingFetcher {
    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, FetchFailure> {
        let mut page = self.inner.fetch(request).await?;
        // Sitemaps and other non-product documents have no gallery
        if !self.product_pattern.is_match(&page.url) {
            return Ok(page);
        }

        match self.browser.open(&page.url, &self.resources).await {
            Ok(mut driver) => {
                let mut images: Vec<String> = reveal_images(driver.as_mut(), &self.config)
                    .await
                    .into_iter()
                    .collect();
                images.sort();
                debug!("Revealed {} gallery images on {}", images.len(), page.url);
                page.revealed_images = images;
            }
            Err(e) => warn!("Could not open gallery for {}: {:#}", page.url, e),
        }
        Ok(page)
    }
}
