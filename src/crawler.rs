//! Drives one site from sitemap to emitted records

use std::sync::Arc;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use tracing::{error, info};

use crate::config::CrawlConfig;
use crate::error::{ExtractError, SitemapError};
use crate::fetcher::{FetchFailure, FetchedPage, PageFetcher, PageRequest, RequestContext};
use crate::fields::ProductPage;
use crate::models::{ProductRecord, VariantContext, VariantPlan, VariantTarget};
use crate::sink::RecordSink;
use crate::sitemap::discover_product_urls;
use crate::stats::{RunStatistics, RunSummary};
use crate::traits::SiteExtractor;

/// What a parsed product page still needs: records ready to emit and
/// requests for variants living on other URLs
#[derive(Default)]
struct PageWork {
    records: Vec<(String, Result<ProductRecord, ExtractError>)>,
    requests: Vec<PageRequest>,
}

pub struct CatalogCrawler {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn SiteExtractor>,
    sinks: Vec<Arc<dyn RecordSink>>,
    stats: Arc<RunStatistics>,
    concurrency: usize,
    page_limit: Option<usize>,
}

impl CatalogCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn SiteExtractor>,
        stats: Arc<RunStatistics>,
        config: &CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            sinks: Vec::new(),
            stats,
            concurrency: config.concurrency.max(1),
            page_limit: config.page_limit,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Crawls every product page in the site's sitemap and returns the run summary.
    ///
    /// Only a failure to read the seed sitemap aborts the run; every page and
    /// variant failure is recorded in the statistics instead.
    pub async fn run(&self) -> Result<RunSummary, SitemapError> {
        let profile = self.extractor.profile();
        let mut urls = discover_product_urls(self.fetcher.as_ref(), profile).await?;
        if let Some(limit) = self.page_limit {
            urls.truncate(limit);
        }
        info!("Crawling {} {} product pages", urls.len(), profile.name);

        stream::iter(urls)
            .map(|url| self.crawl_product(url))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<()>>()
            .await;

        for sink in &self.sinks {
            if let Err(e) = sink.finish().await {
                error!("Failed to flush output: {:#}", e);
            }
        }

        let summary = self.stats.summary(&profile.name);
        summary.log();
        Ok(summary)
    }

    async fn crawl_product(&self, url: String) {
        let page = match self.fetcher.fetch(PageRequest::new(url)).await {
            Ok(page) => page,
            Err(failure) => {
                self.record_fetch_failure(&failure);
                return;
            }
        };

        let Some(work) = self.plan_page(&page) else {
            return;
        };
        for (variant_id, result) in work.records {
            self.emit(&variant_id, &page.url, result).await;
        }
        join_all(work.requests.into_iter().map(|request| self.crawl_variant(request))).await;
    }

    async fn crawl_variant(&self, request: PageRequest) {
        let page = match self.fetcher.fetch(request).await {
            Ok(page) => page,
            Err(failure) => {
                self.record_fetch_failure(&failure);
                return;
            }
        };

        let context = page
            .context
            .variant_context()
            .unwrap_or_else(|| VariantContext::single(&page.url));
        let variant_id = context.variant_id.clone();
        let result = {
            let parsed = ProductPage::parse(&page.url, &page.body, &page.revealed_images);
            self.extractor.extract_record(&parsed, context)
        };
        self.emit(&variant_id, &page.url, result).await;
    }

    /// Parses the page and decides what to extract and what to fetch.
    /// The parsed document never outlives this call.
    fn plan_page(&self, fetched: &FetchedPage) -> Option<PageWork> {
        let page = ProductPage::parse(&fetched.url, &fetched.body, &fetched.revealed_images);
        let plan = match self.extractor.plan_variants(&page) {
            Ok(plan) => plan,
            Err(e @ ExtractError::PatternMiss { .. }) => {
                error!("{}", e);
                return None;
            }
            Err(e) => {
                error!("Failed to read color variants on {}: {}", page.url, e);
                self.stats.record_failure(&e.to_string(), page.url);
                return None;
            }
        };

        let mut work = PageWork::default();
        match plan {
            VariantPlan::Single { product_id } => {
                let record = self.extractor.extract_record(&page, VariantContext::single(&product_id));
                work.records.push((product_id, record));
            }
            VariantPlan::Variants {
                base_id,
                candidates,
                counted,
            } => {
                if counted {
                    self.stats.add_variants(candidates.len());
                    let fetches = candidates
                        .iter()
                        .any(|c| matches!(c.target, VariantTarget::Fetch(_)));
                    info!(
                        "Found {} color variants on {}. {}",
                        candidates.len(),
                        page.url,
                        if fetches {
                            "Dispatching variant requests."
                        } else {
                            "Processing all variants from main page."
                        }
                    );
                }

                for candidate in candidates {
                    let context = VariantContext::for_candidate(&base_id, &candidate);
                    match candidate.target {
                        VariantTarget::SamePage => {
                            let record = self.extractor.extract_record(&page, context);
                            work.records.push((candidate.variant_id, record));
                        }
                        VariantTarget::Fetch(url) => {
                            let request = PageRequest::new(url).with_context(RequestContext::for_variant(&context));
                            work.requests.push(request);
                        }
                    }
                }
            }
        }
        Some(work)
    }

    async fn emit(&self, variant_id: &str, url: &str, result: Result<ProductRecord, ExtractError>) {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to scrape {}: {}", variant_id, e);
                error!("URL: {}", url);
                self.stats.record_failure(&e.to_string(), variant_id);
                return;
            }
        };

        for sink in &self.sinks {
            if let Err(e) = sink.emit(&record).await {
                error!("Failed to write {}: {:#}", variant_id, e);
                self.stats.record_failure(&e.to_string(), variant_id);
                return;
            }
        }

        self.stats.record_success(variant_id);
        info!(
            "Successfully scraped: {} ({}) with {} images",
            record.name, record.product_id, record.image_count
        );
    }

    fn record_fetch_failure(&self, failure: &FetchFailure) {
        let variant_id = failure
            .request
            .context
            .variant_id
            .as_deref()
            .unwrap_or("Unknown ID");
        let message = failure.error.classification();
        error!("Request failed for {}: {}", variant_id, message);
        self.stats.record_failure(&message, variant_id);
    }
}
