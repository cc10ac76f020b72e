//! Uniqlo India extractor
//!
//! Product pages list colors as radio chips; each color is served from the
//! same URL with a `colorCode` query, so every chip becomes its own request.

use anyhow::Result;
use regex::Regex;
use tracing::info;

use crate::error::ExtractError;
use crate::fields::{ProductPage, Probe, non_empty, parse_selector};
use crate::images::{ColorStrategy, ImagePolicy};
use crate::models::{VariantCandidate, VariantPlan, VariantTarget};
use crate::scrapers::strip_query;
use crate::traits::{ResourcePolicy, SiteExtractor, SiteProfile};

const COLOR_CHIPS: &str = "div.color-picker-wrapper div.fr-chip-wrapper-er";
const COLOR_LABEL: &str = "label.fr-chip-label.color";
const COLOR_NAME: &str = "span.fr-implicit";
const COLOR_CODE: &str = r#"input[type="radio"]"#;

const NAME_PROBES: &[Probe] = &[Probe::Text("h1.fr-head span.title")];

const PRICE_PROBES: &[Probe] = &[
    Probe::Text("span.price-limited-ER span.fr-price-currency span:last-child"),
    Probe::Text("div.dual-price-original-ER span.fr-price-currency span:last-child"),
    Probe::Text("span.price-original-ER span.fr-price-currency span:last-child"),
];

const IMAGE_POLICY: ImagePolicy = ImagePolicy {
    high_res: &[
        (r#"section[data-section="product-image"] img"#, "src"),
        (r#"section[data-section="product-image"] img"#, "data-src"),
        ("div.product-main-image img", "src"),
        ("div.product-main-image img", "data-src"),
    ],
    fallback: &[],
    srcset: &[],
    allow_hosts: &["uniqlo.com"],
    allow_protocol_relative: true,
    asset_host: "https://image.uniqlo.com",
    junk_suffixes: &[],
    min_segment_len: None,
    reject: None,
    rendition: Some("?width=750"),
    structured_data: false,
    color: ColorStrategy::Restrict(&["goods_{code}_{base}", "ingoods_{code}_{base}"]),
};

pub fn profile() -> Result<SiteProfile> {
    Ok(SiteProfile {
        name: "Uniqlo".to_string(),
        base_url: "https://www.uniqlo.com".to_string(),
        sitemap_url: "https://www.uniqlo.com/in/sitemap_in-en_l3_hreflang.xml".to_string(),
        product_pattern: Regex::new(r"/products/E\d{6}-\d{3}")?,
        child_sitemap_marker: None,
        name_probes: NAME_PROBES,
        price_probes: PRICE_PROBES,
        suffix_color_in_name: true,
        images: IMAGE_POLICY,
        resources: ResourcePolicy::first_party("uniqlo.com"),
    })
}

/// The path segment right after `/products/`
fn product_id(url: &str) -> Option<String> {
    let (_, rest) = strip_query(url).split_once("/products/")?;
    let id = rest.split('/').next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

pub struct UniqloExtractor {
    profile: SiteProfile,
}

impl UniqloExtractor {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }
}

impl SiteExtractor for UniqloExtractor {
    fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn plan_variants(&self, page: &ProductPage<'_>) -> Result<VariantPlan, ExtractError> {
        let base_url = strip_query(page.url);
        let base_id = product_id(base_url).ok_or_else(|| ExtractError::PatternMiss {
            url: base_url.to_string(),
            what: "base product ID",
        })?;

        let chip_selector = parse_selector(COLOR_CHIPS)?;
        let chips: Vec<_> = page.document.select(&chip_selector).collect();
        if chips.is_empty() {
            info!("No color variants found on {}. Parsing as a single product.", page.url);
            return Ok(VariantPlan::Single { product_id: base_id });
        }

        let label_selector = parse_selector(COLOR_LABEL)?;
        let name_selector = parse_selector(COLOR_NAME)?;
        let code_selector = parse_selector(COLOR_CODE)?;

        let candidates: Vec<VariantCandidate> = chips
            .iter()
            .filter(|chip| chip.select(&label_selector).next().is_some())
            .filter_map(|chip| {
                let color_name = chip
                    .select(&name_selector)
                    .find_map(|el| non_empty(el.value().attr("aria-label")));
                let color_code = chip
                    .select(&code_selector)
                    .find_map(|el| non_empty(el.value().attr("value")))
                    .or_else(|| color_name.clone())?;

                let variant_id = format!("{base_id}-COL{color_code}");
                let variant_url = format!("{base_url}?colorCode=COL{color_code}");
                info!(
                    "Queueing request for color: {} ({}) at {}",
                    color_name.as_deref().unwrap_or("unnamed"),
                    variant_id,
                    variant_url
                );
                Some(VariantCandidate {
                    color_name,
                    color_code,
                    variant_id,
                    target: VariantTarget::Fetch(variant_url),
                })
            })
            .collect();

        if candidates.is_empty() {
            info!("No color variants found on {}.", page.url);
            return Ok(VariantPlan::Single { product_id: base_id });
        }

        Ok(VariantPlan::Variants {
            base_id,
            candidates,
            counted: true,
        })
    }
}
