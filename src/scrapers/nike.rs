//! Nike India extractor

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use crate::error::ExtractError;
use crate::fields::{ProductPage, Probe, element_text, first_match, non_empty, parse_selector};
use crate::images::{ColorStrategy, ImagePolicy};
use crate::models::{VariantCandidate, VariantContext, VariantPlan, VariantTarget};
use crate::scrapers::{last_segment, strip_query};
use crate::traits::{ResourcePolicy, SiteExtractor, SiteProfile};

const COLORWAY_LINKS: &str =
    r#"div[data-testid="colorway-picker-container"] a[data-testid^="colorway-link-"]"#;
const COLORWAY_IMAGE: &str = "img";
const COLOR_DESCRIPTION: &str = r#"li[data-testid="product-description-color-description"]"#;
const STYLE_DESCRIPTION: &str = r#"li[data-testid="product-description-style-color"]"#;

const NAME_PROBES: &[Probe] = &[
    Probe::Text(r#"h1[data-testid="product_title"]"#),
    Probe::Text("#pdp_product_title"),
    Probe::Text("h1"),
];

const SUBTITLE_PROBES: &[Probe] = &[
    Probe::Text(r#"h2[data-testid="product_subtitle"]"#),
    Probe::Text("#pdp_product_subtitle"),
];

const PRICE_PROBES: &[Probe] = &[
    Probe::Text(r#"span[data-testid="currentPrice-container"]"#),
    Probe::Text("#price-container span"),
    Probe::Text(r#"[data-testid*="price"] span"#),
    Probe::Text(".price span"),
];

const IMAGE_POLICY: ImagePolicy = ImagePolicy {
    high_res: &[
        (r#"div[data-testid="HeroImgContainer"] img[data-testid="HeroImg"]"#, "src"),
        (r#"div[data-testid="HeroImgContainer"] img"#, "data-preload"),
        (r#"div[data-testid="HeroImgContainer"] img"#, "src"),
    ],
    fallback: &[],
    srcset: &[(r#"div[data-testid="HeroImgContainer"] img"#, "srcset")],
    allow_hosts: &["nike.com"],
    allow_protocol_relative: true,
    asset_host: "https://static.nike.com",
    junk_suffixes: &[],
    min_segment_len: None,
    reject: None,
    rendition: Some("?width=1728&height=1728"),
    structured_data: false,
    color: ColorStrategy::Ignore,
};

pub fn profile() -> Result<SiteProfile> {
    Ok(SiteProfile {
        name: "Nike".to_string(),
        base_url: "https://www.nike.com".to_string(),
        sitemap_url: "https://www.nike.com/sitemap-v2-pdp-en-in.xml".to_string(),
        product_pattern: Regex::new(r"/in/t/[\w-]+-[A-Z0-9]+")?,
        child_sitemap_marker: None,
        name_probes: NAME_PROBES,
        price_probes: PRICE_PROBES,
        suffix_color_in_name: true,
        images: IMAGE_POLICY,
        resources: ResourcePolicy::first_party("nike.com"),
    })
}

/// Product code: the last `-` token of the URL's last path segment
fn product_code(url: &str) -> Option<String> {
    let code = last_segment(url).rsplit('-').next().unwrap_or_default();
    (!code.is_empty()).then(|| code.to_string())
}

/// Text following `label` in the joined contents of every element matching `css`
fn labelled_value(page: &ProductPage<'_>, css: &str, label: &str) -> Result<Option<String>, ExtractError> {
    let selector = parse_selector(css)?;
    let text = page
        .document
        .select(&selector)
        .filter_map(element_text)
        .collect::<Vec<_>>()
        .join(" ");
    debug!("Raw {} text: {}", label, text);

    Ok(text
        .rsplit_once(label)
        .and_then(|(_, value)| non_empty(Some(value))))
}

pub struct NikeExtractor {
    profile: SiteProfile,
}

impl NikeExtractor {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }
}

impl SiteExtractor for NikeExtractor {
    fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn plan_variants(&self, page: &ProductPage<'_>) -> Result<VariantPlan, ExtractError> {
        let base_url = strip_query(page.url);
        let code = product_code(base_url).ok_or_else(|| ExtractError::PatternMiss {
            url: base_url.to_string(),
            what: "product code",
        })?;

        let link_selector = parse_selector(COLORWAY_LINKS)?;
        let links: Vec<_> = page.document.select(&link_selector).collect();
        if links.is_empty() {
            info!("No color variants found on {}. Parsing as a single product.", page.url);
            return Ok(VariantPlan::Single { product_id: code });
        }

        let image_selector = parse_selector(COLORWAY_IMAGE)?;
        let candidates: Vec<VariantCandidate> = links
            .iter()
            .filter_map(|link| {
                let href = link.value().attr("href").filter(|href| href.contains('/'))?;
                let slug = last_segment(href);
                if slug.is_empty() {
                    return None;
                }
                let color_name = link
                    .select(&image_selector)
                    .find_map(|img| non_empty(img.value().attr("alt")));

                let variant_id = format!("{code}-{slug}");
                let variant_url = self.profile.absolute_url(href);
                info!(
                    "Queueing request for color: {} ({}) at {}",
                    color_name.as_deref().unwrap_or("unnamed"),
                    variant_id,
                    variant_url
                );
                Some(VariantCandidate {
                    color_name,
                    color_code: slug.to_string(),
                    variant_id,
                    target: VariantTarget::Fetch(variant_url),
                })
            })
            .collect();

        if candidates.is_empty() {
            info!("No color variants found on {}.", page.url);
            return Ok(VariantPlan::Single { product_id: code });
        }

        Ok(VariantPlan::Variants {
            base_id: code,
            candidates,
            counted: true,
        })
    }

    /// Title followed by the subtitle ("Air Max 90 Men's Shoes")
    fn product_name(&self, page: &ProductPage<'_>) -> Result<Option<String>, ExtractError> {
        let Some(title) = first_match(page, self.profile.name_probes)? else {
            return Ok(None);
        };
        Ok(Some(match first_match(page, SUBTITLE_PROBES)? {
            Some(subtitle) => format!("{title} {subtitle}"),
            None => title,
        }))
    }

    /// The description's "Colour Shown" and "Style" lines win over the colorway link
    fn refine_context(&self, page: &ProductPage<'_>, mut context: VariantContext) -> VariantContext {
        if let Ok(Some(color)) = labelled_value(page, COLOR_DESCRIPTION, "Colour Shown:") {
            context.color_name = Some(color);
        }
        if let Ok(Some(style)) = labelled_value(page, STYLE_DESCRIPTION, "Style:") {
            context.color_code = Some(style);
        }
        debug!(
            "Final values - Color name: {:?}, Color code: {:?}",
            context.color_name, context.color_code
        );
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_URL: &str = "https://www.nike.com/in/t/air-max-90-shoes-kGq7Nm/IB6197-229";

    const PAGE: &str = r##"<html><body>
        <h1 data-testid="product_title">Nike Air Max 90</h1>
        <h2 data-testid="product_subtitle">Men's Shoes</h2>
        <div id="price-container"><span data-testid="currentPrice-container">MRP : ₹ 13,995.00</span></div>
        <div data-testid="colorway-picker-container">
            <a data-testid="colorway-link-0" href="/in/t/air-max-90-shoes-kGq7Nm/IB6197-229"><img alt="Khaki/Sail"></a>
            <a data-testid="colorway-link-1" href="/in/t/air-max-90-shoes-kGq7Nm/IB6197-001"><img alt="Black/White"></a>
            <a data-testid="colorway-link-2" href="#"><img alt="Placeholder"></a>
        </div>
        <ul>
            <li data-testid="product-description-color-description">Colour Shown: Khaki/Sail/Light Bone</li>
            <li data-testid="product-description-style-color">Style: IB6197-229</li>
        </ul>
        <div data-testid="HeroImgContainer">
            <img data-testid="HeroImg" src="https://static.nike.com/a/images/t_web_pdp/hero.png?w=500"
                 srcset="https://static.nike.com/a/images/t_web_pdp/side.png 1x, //static.nike.com/a/images/t_web_pdp/back.png 2x">
            <img data-preload="/a/images/t_web_pdp/sole.png">
        </div>
    </body></html>"##;

    fn extractor() -> NikeExtractor {
        NikeExtractor::new(profile().unwrap())
    }

    #[test]
    fn test_colorway_links() {
        let page = ProductPage::parse(PRODUCT_URL, PAGE, &[]);
        let VariantPlan::Variants { base_id, candidates, .. } = extractor().plan_variants(&page).unwrap() else {
            panic!("expected variants");
        };

        assert_eq!(base_id, "229");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].variant_id, "229-IB6197-001");
        assert_eq!(candidates[1].color_name.as_deref(), Some("Black/White"));
        assert_eq!(
            candidates[1].target,
            VariantTarget::Fetch("https://www.nike.com/in/t/air-max-90-shoes-kGq7Nm/IB6197-001".to_string())
        );
    }

    #[test]
    fn test_description_overrides_link_color() {
        let page = ProductPage::parse(PRODUCT_URL, PAGE, &[]);
        let context = VariantContext {
            variant_id: "229-IB6197-229".to_string(),
            base_id: "229".to_string(),
            color_name: Some("Khaki/Sail".to_string()),
            color_code: Some("IB6197-229".to_string()),
        };

        let record = extractor().extract_record(&page, context).unwrap();

        assert_eq!(record.name, "Nike Air Max 90 Men's Shoes - Khaki/Sail/Light Bone");
        assert_eq!(record.color_code.as_deref(), Some("IB6197-229"));
        assert_eq!(record.price, "13995.00");
        assert_eq!(
            record.image_urls,
            vec![
                "https://static.nike.com/a/images/t_web_pdp/back.png?width=1728&height=1728",
                "https://static.nike.com/a/images/t_web_pdp/hero.png?width=1728&height=1728",
                "https://static.nike.com/a/images/t_web_pdp/side.png?width=1728&height=1728",
            ]
        );
    }

    #[test]
    fn test_label_value_follows_last_occurrence() {
        let page = ProductPage::parse(
            PRODUCT_URL,
            r#"<ul>
                <li data-testid="product-description-color-description">Colour Shown: Colour Shown: Black/White</li>
            </ul>"#,
            &[],
        );
        assert_eq!(
            labelled_value(&page, COLOR_DESCRIPTION, "Colour Shown:").unwrap().as_deref(),
            Some("Black/White")
        );
    }

    #[test]
    fn test_page_without_picker_is_single() {
        let page = ProductPage::parse(
            "https://www.nike.com/in/t/pegasus-41-FD2722?cp=1",
            "<html><h1>Pegasus 41</h1></html>",
            &[],
        );
        assert_eq!(
            extractor().plan_variants(&page).unwrap(),
            VariantPlan::Single {
                product_id: "FD2722".to_string()
            }
        );
    }
}
