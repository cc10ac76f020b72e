//! Traits and interfaces for site-agnostic product extraction

use regex::Regex;

use crate::error::ExtractError;
use crate::fields::{Probe, ProductPage, compose_name, first_match, normalize_price};
use crate::images::{self, ImagePolicy};
use crate::models::{ProductFields, ProductRecord, VariantContext, VariantPlan};

/// Configuration for one retail site
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Display name for the website
    pub name: String,
    /// Origin used to absolutize relative product links
    pub base_url: String,
    /// Seed sitemap (or sitemap index)
    pub sitemap_url: String,
    /// Shape of a product-page URL
    pub product_pattern: Regex,
    /// Only child sitemaps containing this marker are followed
    pub child_sitemap_marker: Option<String>,
    /// Ordered alternatives for the product name
    pub name_probes: &'static [Probe],
    /// Ordered alternatives for the price text
    pub price_probes: &'static [Probe],
    /// Whether the color name is appended to the product name
    pub suffix_color_in_name: bool,
    pub images: ImagePolicy,
    pub resources: ResourcePolicy,
}

impl SiteProfile {
    pub fn with_sitemap_url(mut self, url: impl Into<String>) -> Self {
        self.sitemap_url = url.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Absolute form of a link found on one of this site's pages
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), href)
        }
    }
}

/// Which subresources a rendering fetcher should let through
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    /// Resource types never loaded
    pub blocked_types: &'static [&'static str],
    /// Resource types loaded only from the first-party host
    pub first_party_types: &'static [&'static str],
    pub first_party_host: &'static str,
}

impl ResourcePolicy {
    pub const fn first_party(host: &'static str) -> Self {
        Self {
            blocked_types: &["image", "font", "media"],
            first_party_types: &["stylesheet", "script"],
            first_party_host: host,
        }
    }

    pub fn should_block(&self, resource_type: &str, url: &str) -> bool {
        if self.blocked_types.iter().any(|t| *t == resource_type) {
            return true;
        }
        self.first_party_types.iter().any(|t| *t == resource_type) && !url.contains(self.first_party_host)
    }
}

/// Trait for site-specific extractors.
///
/// Implementations are synchronous and stateless; they only read the page
/// they are handed. Everything except variant enumeration has a default
/// driven by the [`SiteProfile`] tables.
pub trait SiteExtractor: Send + Sync {
    /// Get the configuration for this extractor
    fn profile(&self) -> &SiteProfile;

    /// Decide whether the page is one product or several color variants
    ///
    /// # Errors
    /// * `ExtractError::PatternMiss` - the product id cannot be read from the URL
    fn plan_variants(&self, page: &ProductPage<'_>) -> Result<VariantPlan, ExtractError>;

    fn product_name(&self, page: &ProductPage<'_>) -> Result<Option<String>, ExtractError> {
        first_match(page, self.profile().name_probes)
    }

    fn product_price(&self, page: &ProductPage<'_>) -> Result<Option<String>, ExtractError> {
        first_match(page, self.profile().price_probes)
    }

    /// Adjust the variant's color from what the page itself says
    fn refine_context(&self, _page: &ProductPage<'_>, context: VariantContext) -> VariantContext {
        context
    }

    /// Name and price for one variant
    ///
    /// # Errors
    /// * `ExtractError::MissingFields` - name or price is absent after every fallback
    fn extract_fields(
        &self,
        page: &ProductPage<'_>,
        context: &VariantContext,
    ) -> Result<ProductFields, ExtractError> {
        let name = self.product_name(page)?;
        let price = self.product_price(page)?.map(|p| normalize_price(&p));

        match (name, price) {
            (Some(name), Some(price)) if !price.is_empty() => Ok(ProductFields {
                name: compose_name(
                    &name,
                    context.color_name.as_deref(),
                    self.profile().suffix_color_in_name,
                ),
                price,
            }),
            _ => Err(ExtractError::MissingFields),
        }
    }

    fn resolve_images(
        &self,
        page: &ProductPage<'_>,
        context: &VariantContext,
    ) -> Result<Vec<String>, ExtractError> {
        images::resolve_images(page, &self.profile().images, context)
    }

    /// Full record for one variant of `page`
    fn extract_record(
        &self,
        page: &ProductPage<'_>,
        context: VariantContext,
    ) -> Result<ProductRecord, ExtractError> {
        let context = self.refine_context(page, context);
        let fields = self.extract_fields(page, &context)?;
        let images = self.resolve_images(page, &context)?;
        Ok(ProductRecord::new(fields, &context, page.url.to_string(), images))
    }
}
