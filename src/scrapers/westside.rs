//! Westside extractor
//!
//! Each sitemap URL is already one colorway, so the page yields at most one
//! variant: the color of the swatch pointing back at this URL, or a color
//! word from the product name.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::info;

use crate::error::ExtractError;
use crate::fields::{ProductPage, Probe, element_text, first_match, parse_selector};
use crate::images::{ColorStrategy, ImagePolicy};
use crate::models::{VariantCandidate, VariantPlan, VariantTarget};
use crate::scrapers::{strip_query, title_case};
use crate::traits::{ResourcePolicy, SiteExtractor, SiteProfile};

static PRODUCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/products/[\w-]+-(\d+)$").expect("product id regex"));
static SWATCH_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"location\.href='([^']+)'").expect("swatch target regex"));
static COLOR_WORDS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(
            r"\b(white|black|blue|red|green|yellow|pink|purple|orange|brown|grey|gray|beige|navy|olive|dusty\s+\w+)\b",
        )
        .expect("basic color regex"),
        Regex::new(r"\b(ivory|cream|tan|charcoal|wine|taupe|sage|rust|indigo|mustard|dark\s+\w+)\b")
            .expect("extended color regex"),
    ]
});

const SWATCHES: &str = ".swatch .swatch-element.color";
const SWATCH_TOOLTIP: &str = ".tooltip";
const SWATCH_LABEL: &str = "label[onclick]";

const NAME_PROBES: &[Probe] = &[
    Probe::Text(".product__title h1"),
    Probe::Text(".product__title h2"),
    Probe::Text("h1"),
    Probe::Text(".pdptitle h1"),
];

const PRICE_PROBES: &[Probe] = &[
    Probe::Text(".price__sale .price-item--sale"),
    Probe::Text(".price__regular .price-item--regular"),
    Probe::Text(".price-item"),
    Probe::Text(".money"),
    Probe::Pattern(r"₹\s*[\d,]+(?:\.\d{2})?"),
];

const IMAGE_POLICY: ImagePolicy = ImagePolicy {
    high_res: &[
        ("media-gallery img", "src"),
        (r#"media-gallery [data-fancybox="gallery"]"#, "href"),
    ],
    fallback: &[],
    srcset: &[],
    allow_hosts: &["cdn.shopify.com", "westside.com"],
    allow_protocol_relative: false,
    asset_host: "https://www.westside.com",
    junk_suffixes: &[],
    min_segment_len: None,
    reject: Some(r"\d{3}_\d+_\d+copy"),
    rendition: Some("?v=1&width=1200"),
    structured_data: true,
    color: ColorStrategy::Ignore,
};

pub fn profile() -> Result<SiteProfile> {
    Ok(SiteProfile {
        name: "Westside".to_string(),
        base_url: "https://www.westside.com".to_string(),
        sitemap_url: "https://www.westside.com/sitemap.xml".to_string(),
        product_pattern: Regex::new(r"/products/[\w-]+-\d+$")?,
        child_sitemap_marker: Some("sitemap_products_".to_string()),
        name_probes: NAME_PROBES,
        price_probes: PRICE_PROBES,
        suffix_color_in_name: false,
        images: IMAGE_POLICY,
        resources: ResourcePolicy::first_party("westside.com"),
    })
}

/// First color word in a product name, title-cased
pub fn color_from_name(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    COLOR_WORDS
        .iter()
        .find_map(|re| re.captures(&lower))
        .and_then(|caps| caps.get(1))
        .map(|m| title_case(m.as_str()))
}

pub struct WestsideExtractor {
    profile: SiteProfile,
}

impl WestsideExtractor {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }

    /// Tooltip of the swatch whose click target is this very page
    fn swatch_color(&self, page: &ProductPage<'_>) -> Result<Option<String>, ExtractError> {
        let swatch_selector = parse_selector(SWATCHES)?;
        let tooltip_selector = parse_selector(SWATCH_TOOLTIP)?;
        let label_selector = parse_selector(SWATCH_LABEL)?;

        for swatch in page.document.select(&swatch_selector) {
            let Some(tooltip) = swatch.select(&tooltip_selector).find_map(element_text) else {
                continue;
            };
            let targets_page = swatch
                .select(&label_selector)
                .filter_map(|label| label.value().attr("onclick"))
                .filter_map(|onclick| SWATCH_TARGET.captures(onclick))
                .any(|caps| &caps[1] == page.url);
            if targets_page {
                info!("Found color from swatch: {} for URL: {}", tooltip, page.url);
                return Ok(Some(tooltip));
            }
        }
        Ok(None)
    }
}

impl SiteExtractor for WestsideExtractor {
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

        let color = match self.swatch_color(page)? {
            Some(color) => Some(color),
            None => first_match(page, self.profile.name_probes)?
                .as_deref()
                .and_then(color_from_name)
                .inspect(|color| info!("Found color from product name: {}", color)),
        };

        Ok(match color {
            Some(color) => VariantPlan::Variants {
                candidates: vec![VariantCandidate {
                    variant_id: format!("{product_id}-{color}"),
                    color_name: Some(color.clone()),
                    color_code: color,
                    target: VariantTarget::SamePage,
                }],
                base_id: product_id,
                counted: false,
            },
            None => VariantPlan::Single { product_id },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VariantContext;

    const PRODUCT_URL: &str = "https://www.westside.com/products/nuon-solid-dusty-pink-cotton-shirt-301021663";

    fn page_html(swatches: &str) -> String {
        format!(
            r#"<html><body>
                <div class="product__title"><h1>Nuon Solid Dusty Pink Cotton Shirt</h1></div>
                <div class="price__regular"><span class="price-item price-item--regular">₹ 1,299.00</span></div>
                <div class="swatch">{swatches}</div>
                <media-gallery>
                    <img src="//cdn.shopify.com/s/files/1/0266/products/301021663_front.jpg?v=1700">
                    <a data-fancybox="gallery" href="//cdn.shopify.com/s/files/1/0266/products/301021663_back.jpg"></a>
                    <img src="//cdn.shopify.com/s/files/1/0266/products/301021663016_5_20copy.jpg">
                </media-gallery>
            </body></html>"#
        )
    }

    fn extractor() -> WestsideExtractor {
        WestsideExtractor::new(profile().unwrap())
    }

    #[test]
    fn test_color_from_matching_swatch() {
        let html = page_html(&format!(
            r#"<div class="swatch-element color"><span class="tooltip">Light Pink</span>
                   <label onclick="location.href='{PRODUCT_URL}'"></label></div>
               <div class="swatch-element color"><span class="tooltip">Blue</span>
                   <label onclick="location.href='https://www.westside.com/products/nuon-solid-blue-cotton-shirt-301021664'"></label></div>"#
        ));
        let page = ProductPage::parse(PRODUCT_URL, &html, &[]);
        let VariantPlan::Variants {
            base_id,
            candidates,
            counted,
        } = extractor().plan_variants(&page).unwrap()
        else {
            panic!("expected a variant");
        };

        assert_eq!(base_id, "301021663");
        assert!(!counted);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].variant_id, "301021663-Light Pink");
        assert_eq!(candidates[0].target, VariantTarget::SamePage);
    }

    #[test]
    fn test_color_from_product_name() {
        let html = page_html("");
        let page = ProductPage::parse(PRODUCT_URL, &html, &[]);
        let VariantPlan::Variants { candidates, .. } = extractor().plan_variants(&page).unwrap() else {
            panic!("expected a variant");
        };

        assert_eq!(candidates[0].color_name.as_deref(), Some("Dusty Pink"));
        assert_eq!(candidates[0].variant_id, "301021663-Dusty Pink");
    }

    #[test]
    fn test_no_color_is_single() {
        let html = "<html><h1>Nuon Printed Shirt</h1></html>";
        let page = ProductPage::parse("https://www.westside.com/products/nuon-printed-shirt-301000001", html, &[]);
        assert_eq!(
            extractor().plan_variants(&page).unwrap(),
            VariantPlan::Single {
                product_id: "301000001".to_string()
            }
        );
    }

    #[test]
    fn test_record_keeps_bare_name_and_skips_swatch_images() {
        let html = page_html("");
        let page = ProductPage::parse(PRODUCT_URL, &html, &[]);
        let context = VariantContext {
            variant_id: "301021663-Dusty Pink".to_string(),
            base_id: "301021663".to_string(),
            color_name: Some("Dusty Pink".to_string()),
            color_code: Some("Dusty Pink".to_string()),
        };

        let record = extractor().extract_record(&page, context).unwrap();

        assert_eq!(record.name, "Nuon Solid Dusty Pink Cotton Shirt");
        assert_eq!(record.price, "1299.00");
        assert_eq!(
            record.image_urls,
            vec![
                "https://cdn.shopify.com/s/files/1/0266/products/301021663_back.jpg?v=1&width=1200",
                "https://cdn.shopify.com/s/files/1/0266/products/301021663_front.jpg?v=1&width=1200",
            ]
        );
    }

    #[test]
    fn test_color_words() {
        assert_eq!(color_from_name("Wardrobe Dark Green Blazer").as_deref(), Some("Green"));
        assert_eq!(color_from_name("Gia Ivory Kurta").as_deref(), Some("Ivory"));
        assert_eq!(color_from_name("LOV Printed Dress"), None);
    }
}
