//! Marks & Spencer India extractor
//!
//! Every color is rendered on the product page itself; variant URLs redirect
//! back to it, so all variants are extracted from the one response.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use scraper::ElementRef;
use tracing::info;

use crate::error::ExtractError;
use crate::fields::{ProductPage, Probe, non_empty, parse_selector};
use crate::images::{ColorStrategy, ImagePolicy};
use crate::models::{VariantCandidate, VariantPlan, VariantTarget};
use crate::scrapers::strip_query;
use crate::traits::{ResourcePolicy, SiteExtractor, SiteProfile};

static PRODUCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/p/(P\w+)\.html").expect("product id regex"));

const SWATCHES: &str = ".colour-swatcher a.swatch-link";
const SWATCHES_ALTERNATE: &str = ".color .swatch-link, .colour-picker a, .colour-selector a";
const SWATCH_NAME: &str = ".swatch-circle";

const NAME_PROBES: &[Probe] = &[
    Probe::Text("h1.product-name"),
    Probe::Text(".product-name h1"),
    Probe::Text("h1"),
    Probe::Text(".product-title"),
];

const PRICE_PROBES: &[Probe] = &[
    Probe::Attr(".list-pricecolour .value", "content"),
    Probe::Attr("span.list-pricecolour span.value", "content"),
    Probe::Text(".list-pricecolour .value"),
    Probe::Attr(".price .value", "content"),
    Probe::Text(".price .value"),
    Probe::Attr("span.value", "content"),
    Probe::Text("span.value"),
    Probe::Pattern(r"₹[\d,]+(?:\.\d{2})?"),
];

const IMAGE_POLICY: ImagePolicy = ImagePolicy {
    high_res: &[
        (".swiper-slide img", "data-hover-image-src"),
        (".product-carousel__product-image", "data-hover-image-src"),
        (".swiper-wrapper img", "data-hover-image-src"),
        (".pdpMainCarousel img", "data-hover-image-src"),
    ],
    fallback: &[
        (".swiper-slide img", "src"),
        (".product-carousel__product-image", "src"),
        (".swiper-wrapper img", "src"),
        (".pdpMainCarousel img", "src"),
    ],
    srcset: &[
        (".swiper-slide img", "srcset"),
        (".product-carousel__product-image", "srcset"),
    ],
    allow_hosts: &["digitalcontent.marksandspencer", "assets.digitalcontent"],
    allow_protocol_relative: false,
    asset_host: "https://assets.digitalcontent.marksandspencer.app",
    junk_suffixes: &["/w_1008", "/w_600"],
    min_segment_len: Some(11),
    reject: None,
    rendition: None,
    structured_data: false,
    color: ColorStrategy::Rewrite {
        pattern: r"_([A-Z0-9]{1,3})_X_",
        replacement: "_{code}_X_",
    },
};

pub fn profile() -> Result<SiteProfile> {
    Ok(SiteProfile {
        name: "Marks & Spencer".to_string(),
        base_url: "https://www.marksandspencer.in".to_string(),
        sitemap_url: "https://www.marksandspencer.in/sitemap_0.xml".to_string(),
        product_pattern: Regex::new(r"/p/P\w+\.html(?:\?.*)?")?,
        child_sitemap_marker: None,
        name_probes: NAME_PROBES,
        price_probes: PRICE_PROBES,
        suffix_color_in_name: true,
        images: IMAGE_POLICY,
        resources: ResourcePolicy::first_party("marksandspencer.in"),
    })
}

pub struct MarksSpencerExtractor {
    profile: SiteProfile,
}

impl MarksSpencerExtractor {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }
}

impl SiteExtractor for MarksSpencerExtractor {
    fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn plan_variants(&self, page: &ProductPage<'_>) -> Result<VariantPlan, ExtractError> {
        let base_url = strip_query(page.url);
        let product_id = PRODUCT_ID
            .captures(base_url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ExtractError::PatternMiss {
                url: base_url.to_string(),
                what: "product ID",
            })?;

        let primary = parse_selector(SWATCHES)?;
        let mut swatches: Vec<ElementRef<'_>> = page.document.select(&primary).collect();
        if swatches.is_empty() {
            let alternate = parse_selector(SWATCHES_ALTERNATE)?;
            swatches = page.document.select(&alternate).collect();
        }
        if swatches.is_empty() {
            info!("No color variants found on {}. Processing as single product.", page.url);
            return Ok(VariantPlan::Single { product_id });
        }

        let name_selector = parse_selector(SWATCH_NAME)?;
        let candidates: Vec<VariantCandidate> = swatches
            .iter()
            .filter_map(|swatch| {
                let swatch_name = swatch
                    .select(&name_selector)
                    .find_map(|el| non_empty(el.value().attr("data-attr-value")));
                let color_code = non_empty(swatch.value().attr("data-swatchid")).or_else(|| swatch_name.clone())?;
                let color_name = swatch_name.unwrap_or_else(|| color_code.clone());

                Some(VariantCandidate {
                    variant_id: format!("{product_id}-{color_code}"),
                    color_name: Some(color_name),
                    color_code,
                    target: VariantTarget::SamePage,
                })
            })
            .collect();

        if candidates.is_empty() {
            info!(
                "Found {} color options but no valid color codes on {}. Processing as single product.",
                swatches.len(),
                page.url
            );
            return Ok(VariantPlan::Single { product_id });
        }

        Ok(VariantPlan::Variants {
            base_id: product_id,
            candidates,
            counted: true,
        })
    }
}
