//! Image URL collection, filtering and color biasing.
//!
//! Every site runs the same pipeline; what differs is the [`ImagePolicy`]
//! table: which attributes to read, which hosts to trust, what counts as a
//! junk URL and how color-specific images are recognized.

use std::collections::BTreeSet;

use regex::{NoExpand, Regex};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::fields::{ProductPage, parse_selector};
use crate::models::VariantContext;

/// A CSS selector and the attribute holding image URLs
pub type ImageSource = (&'static str, &'static str);

/// How an extractor biases images toward the variant's color
#[derive(Debug, Clone, Copy)]
pub enum ColorStrategy {
    /// Images are shared by every color
    Ignore,
    /// Keep only URLs containing one of these markers, or everything if none do.
    /// `{code}` and `{base}` are replaced by the color code and base product id.
    Restrict(&'static [&'static str]),
    /// Swap an embedded color token for the target code; see [`split_by_color`]
    Rewrite {
        pattern: &'static str,
        replacement: &'static str,
    },
}

/// Per-site image resolution table
#[derive(Debug, Clone)]
pub struct ImagePolicy {
    /// Preferred high-resolution sources
    pub high_res: &'static [ImageSource],
    /// Standard sources, read only when `high_res` yields nothing
    pub fallback: &'static [ImageSource],
    /// Responsive `srcset`-style attributes, always read
    pub srcset: &'static [ImageSource],
    /// Substrings identifying trusted image hosts
    pub allow_hosts: &'static [&'static str],
    /// Accept protocol-relative URLs even without an allowlisted host
    pub allow_protocol_relative: bool,
    /// Prefix for bare paths
    pub asset_host: &'static str,
    /// URLs ending in one of these are size stubs, not images
    pub junk_suffixes: &'static [&'static str],
    /// Minimum length of the final path segment
    pub min_segment_len: Option<usize>,
    /// URLs matching this regex are dropped (swatch thumbnails and the like)
    pub reject: Option<&'static str>,
    /// Query string replacing the original one on every kept URL
    pub rendition: Option<&'static str>,
    /// Fall back to `image` entries in JSON-LD blocks
    pub structured_data: bool,
    pub color: ColorStrategy,
}

/// Images partitioned by whether they depict the requested color
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ColorSplit {
    pub color_specific: BTreeSet<String>,
    pub generic: BTreeSet<String>,
}

/// Runs the full image pipeline for one variant and returns a sorted,
/// deduplicated list.
pub fn resolve_images(
    page: &ProductPage<'_>,
    policy: &ImagePolicy,
    context: &VariantContext,
) -> Result<Vec<String>, ExtractError> {
    let reject = policy.reject.map(compile).transpose()?;
    let filter = UrlFilter { policy, reject };

    let mut collected = BTreeSet::new();
    for raw in page.revealed_images {
        filter.accept_into(raw, &mut collected);
    }
    if !collected.is_empty() {
        info!("Using {} revealed gallery images for {}", collected.len(), context.variant_id);
    } else {
        collect_tier(page, policy.high_res, &filter, &mut collected)?;
        if collected.is_empty() {
            collect_tier(page, policy.fallback, &filter, &mut collected)?;
        }
        for (css, attr) in policy.srcset {
            for value in attribute_values(page, css, attr)? {
                for url in srcset_urls(&value) {
                    filter.accept_into(url, &mut collected);
                }
            }
        }
        if collected.is_empty() && policy.structured_data {
            for url in structured_data_images(page)? {
                filter.accept_into(&url, &mut collected);
            }
        }
    }

    let images = apply_color(collected, policy.color, context)?;
    if images.is_empty() {
        warn!(
            "No images found for {} ({})",
            context.variant_id,
            context.color_name.as_deref().unwrap_or("no color")
        );
    }
    Ok(images.into_iter().collect())
}

/// URL portion of every entry in a `srcset` value
pub fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
}

/// Makes a scraped image reference absolute
pub fn normalize_image_url(raw: &str, asset_host: &str) -> String {
    if raw.starts_with("//") {
        format!("https:{raw}")
    } else if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if raw.starts_with('/') {
        format!("{}{raw}", asset_host.trim_end_matches('/'))
    } else {
        format!("https://{raw}")
    }
}

/// Whether a URL is a size stub or a truncated reference
pub fn is_junk(url: &str, policy: &ImagePolicy) -> bool {
    if policy.junk_suffixes.iter().any(|suffix| url.ends_with(suffix)) {
        return true;
    }
    policy.min_segment_len.is_some_and(|min| {
        let segment = url.rsplit('/').next().unwrap_or_default();
        segment.chars().count() < min
    })
}

/// Partitions URLs for a color code.
///
/// A URL carrying the code as `_{code}_` or `_{code}.` is color-specific
/// as-is. Any other URL is run through `pattern`; if the substitution changes
/// it, the rewritten URL is a generated color-specific image, otherwise the
/// original is generic.
pub fn split_by_color(
    urls: &BTreeSet<String>,
    color_code: &str,
    pattern: &Regex,
    replacement: &str,
) -> ColorSplit {
    let delimited = [format!("_{color_code}_"), format!("_{color_code}.")];
    let replacement = replacement.replace("{code}", color_code);
    let mut split = ColorSplit::default();

    for url in urls {
        if delimited.iter().any(|token| url.contains(token.as_str())) {
            split.color_specific.insert(url.clone());
            continue;
        }
        let rewritten = pattern.replace_all(url, NoExpand(&replacement));
        if rewritten != url.as_str() {
            debug!("Generated color-specific URL: {}", rewritten);
            split.color_specific.insert(rewritten.into_owned());
        } else {
            split.generic.insert(url.clone());
        }
    }
    split
}

fn apply_color(
    all: BTreeSet<String>,
    strategy: ColorStrategy,
    context: &VariantContext,
) -> Result<BTreeSet<String>, ExtractError> {
    let Some(code) = context.color_code.as_deref() else {
        return Ok(all);
    };

    match strategy {
        ColorStrategy::Ignore => Ok(all),
        ColorStrategy::Restrict(templates) => {
            let markers: Vec<String> = templates
                .iter()
                .map(|t| t.replace("{code}", code).replace("{base}", &context.base_id))
                .collect();
            let specific: BTreeSet<String> = all
                .iter()
                .filter(|url| markers.iter().any(|m| url.contains(m.as_str())))
                .cloned()
                .collect();
            if specific.is_empty() {
                warn!("No color-specific images found for {}, using all {} images", code, all.len());
                Ok(all)
            } else {
                Ok(specific)
            }
        }
        ColorStrategy::Rewrite { pattern, replacement } => {
            let regex = compile(pattern)?;
            let split = split_by_color(&all, code, &regex, replacement);
            if split.color_specific.is_empty() {
                warn!("No color-specific images found for {}, using all {} images", code, all.len());
                return Ok(all);
            }
            info!(
                "Found {} color-specific images for {}, {} generic images",
                split.color_specific.len(),
                code,
                split.generic.len()
            );
            Ok(split.color_specific.union(&split.generic).cloned().collect())
        }
    }
}

struct UrlFilter<'p> {
    policy: &'p ImagePolicy,
    reject: Option<Regex>,
}

impl UrlFilter<'_> {
    fn accept(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            return None;
        }
        let trusted = self.policy.allow_hosts.iter().any(|host| raw.contains(host))
            || (self.policy.allow_protocol_relative && raw.starts_with("//"));
        if !trusted {
            return None;
        }

        let url = normalize_image_url(raw, self.policy.asset_host);
        let base = if self.policy.rendition.is_some() {
            url.split('?').next().unwrap_or_default().to_string()
        } else {
            url
        };
        if is_junk(&base, self.policy) {
            return None;
        }
        if self.reject.as_ref().is_some_and(|re| re.is_match(&base)) {
            return None;
        }

        Some(match self.policy.rendition {
            Some(query) => format!("{base}{query}"),
            None => base,
        })
    }

    fn accept_into(&self, raw: &str, out: &mut BTreeSet<String>) {
        if let Some(url) = self.accept(raw) {
            out.insert(url);
        }
    }
}

fn collect_tier(
    page: &ProductPage<'_>,
    sources: &[ImageSource],
    filter: &UrlFilter<'_>,
    out: &mut BTreeSet<String>,
) -> Result<(), ExtractError> {
    for (css, attr) in sources {
        for value in attribute_values(page, css, attr)? {
            filter.accept_into(&value, out);
        }
    }
    Ok(())
}

fn attribute_values(page: &ProductPage<'_>, css: &str, attr: &str) -> Result<Vec<String>, ExtractError> {
    let selector = parse_selector(css)?;
    Ok(page
        .document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr).map(str::to_string))
        .collect())
}

fn structured_data_images(page: &ProductPage<'_>) -> Result<Vec<String>, ExtractError> {
    let selector = parse_selector(r#"script[type="application/ld+json"]"#)?;
    let mut images = Vec::new();

    for script in page.document.select(&selector) {
        let text = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        match data.get("image") {
            Some(Value::String(url)) => images.push(url.clone()),
            Some(Value::Array(entries)) => {
                images.extend(entries.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
    }
    Ok(images)
}

fn compile(pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|e| ExtractError::Selector {
        selector: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "https://assets.digitalcontent.marksandspencer.app";

    fn policy() -> ImagePolicy {
        ImagePolicy {
            high_res: &[(".swiper-slide img", "data-hover-image-src")],
            fallback: &[(".swiper-slide img", "src")],
            srcset: &[(".swiper-slide img", "srcset")],
            allow_hosts: &["digitalcontent.marksandspencer"],
            allow_protocol_relative: false,
            asset_host: HOST,
            junk_suffixes: &["/w_1008", "/w_600"],
            min_segment_len: Some(11),
            reject: None,
            rendition: None,
            structured_data: false,
            color: ColorStrategy::Rewrite {
                pattern: r"_([A-Z0-9]{1,3})_X_",
                replacement: "_{code}_X_",
            },
        }
    }

    fn context(code: Option<&str>) -> VariantContext {
        VariantContext {
            variant_id: "P60639245-Y0".to_string(),
            base_id: "P60639245".to_string(),
            color_name: code.map(str::to_string),
            color_code: code.map(str::to_string),
        }
    }

    fn set(urls: &[&str]) -> BTreeSet<String> {
        urls.iter().map(|u| (*u).to_string()).collect()
    }

    #[test]
    fn test_normalize_image_url() {
        assert_eq!(
            normalize_image_url("//static.nike.com/a/images/shoe.png", HOST),
            "https://static.nike.com/a/images/shoe.png"
        );
        assert_eq!(
            normalize_image_url("/is/image/SD_01_T43_4476E_Y0_X_EC_0", HOST),
            format!("{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_0")
        );
        assert_eq!(
            normalize_image_url("cdn.shopify.com/s/files/top.jpg", HOST),
            "https://cdn.shopify.com/s/files/top.jpg"
        );
    }

    #[test]
    fn test_low_res_suffix_is_junk() {
        assert!(is_junk(&format!("{HOST}/is/image/w_600"), &policy()));
        assert!(is_junk(&format!("{HOST}/is/image/short"), &policy()));
        assert!(!is_junk(&format!("{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_0"), &policy()));
    }

    #[test]
    fn test_srcset_urls() {
        let urls: Vec<&str> = srcset_urls("https://a.example/x.jpg 1x, https://a.example/y.jpg 2x").collect();
        assert_eq!(urls, vec!["https://a.example/x.jpg", "https://a.example/y.jpg"]);
    }

    #[test]
    fn test_high_res_tier_wins_and_junk_is_dropped() {
        let html = format!(
            r#"<div class="swiper-slide">
                <img data-hover-image-src="{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_0"
                     src="{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_9">
                <img data-hover-image-src="{HOST}/is/image/w_600">
                <img data-hover-image-src="https://tracker.example.com/pixel_long_name.gif">
            </div>"#
        );
        let page = ProductPage::parse("https://www.marksandspencer.in/p/P60639245.html", &html, &[]);
        let images = resolve_images(&page, &policy(), &context(None)).unwrap();

        assert_eq!(images, vec![format!("{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_0")]);
    }

    #[test]
    fn test_fallback_tier_and_srcset() {
        let html = format!(
            r#"<div class="swiper-slide">
                <img src="//assets.digitalcontent.marksandspencer.app/is/image/SD_01_T43_4476E_Y0_X_EC_1"
                     srcset="{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_2 1x, {HOST}/is/image/w_1008 2x">
            </div>"#
        );
        let page = ProductPage::parse("https://www.marksandspencer.in/p/P60639245.html", &html, &[]);
        let images = resolve_images(&page, &policy(), &context(None)).unwrap();

        assert_eq!(
            images,
            vec![
                format!("{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_1"),
                format!("{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_2"),
            ]
        );
    }

    #[test]
    fn test_split_by_color() {
        let regex = Regex::new(r"_([A-Z0-9]{1,3})_X_").unwrap();
        let urls = set(&[
            "https://x.app/SD_01_T43_4476E_Y0_X_EC_0",
            "https://x.app/SD_01_T43_4476E_NY_X_EC_1",
            "https://x.app/lifestyle_banner_image",
        ]);
        let split = split_by_color(&urls, "Y0", &regex, "_{code}_X_");

        assert_eq!(
            split.color_specific,
            set(&[
                "https://x.app/SD_01_T43_4476E_Y0_X_EC_0",
                "https://x.app/SD_01_T43_4476E_Y0_X_EC_1",
            ])
        );
        assert_eq!(split.generic, set(&["https://x.app/lifestyle_banner_image"]));
    }

    #[test]
    fn test_color_union_never_drops_generic_images() {
        let html = format!(
            r#"<div class="swiper-slide">
                <img data-hover-image-src="{HOST}/is/image/SD_01_T43_4476E_NY_X_EC_0">
                <img data-hover-image-src="{HOST}/is/image/lifestyle_banner_image">
                <img data-hover-image-src="{HOST}/is/image/size_guide_drawing">
            </div>"#
        );
        let page = ProductPage::parse("https://www.marksandspencer.in/p/P60639245.html", &html, &[]);
        let images = resolve_images(&page, &policy(), &context(Some("Y0"))).unwrap();

        assert!(images.contains(&format!("{HOST}/is/image/SD_01_T43_4476E_Y0_X_EC_0")));
        assert!(images.contains(&format!("{HOST}/is/image/lifestyle_banner_image")));
        assert!(images.contains(&format!("{HOST}/is/image/size_guide_drawing")));
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn test_restrict_keeps_marked_images_or_everything() {
        let mut restrict = policy();
        restrict.color = ColorStrategy::Restrict(&["goods_{code}_{base}"]);
        restrict.min_segment_len = None;
        let html = format!(
            r#"<div class="swiper-slide">
                <img data-hover-image-src="{HOST}/goods_69_P60639245.jpg">
                <img data-hover-image-src="{HOST}/goods_09_P60639245.jpg">
            </div>"#
        );
        let page = ProductPage::parse("https://example.com", &html, &[]);

        let images = resolve_images(&page, &restrict, &context(Some("69"))).unwrap();
        assert_eq!(images, vec![format!("{HOST}/goods_69_P60639245.jpg")]);

        let images = resolve_images(&page, &restrict, &context(Some("42"))).unwrap();
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn test_revealed_images_replace_selector_tiers() {
        let mut nike = policy();
        nike.allow_hosts = &["nike.com"];
        nike.allow_protocol_relative = true;
        nike.min_segment_len = None;
        nike.rendition = Some("?width=1728&height=1728");
        nike.color = ColorStrategy::Ignore;
        let revealed = vec![
            "https://static.nike.com/a/images/t_default/one.png?w=300".to_string(),
            "//static.nike.com/a/images/t_default/two.png".to_string(),
            "data:image/gif;base64,R0lGOD".to_string(),
        ];
        let html = r#"<div class="swiper-slide"><img src="https://static.nike.com/a/three.png"></div>"#;
        let page = ProductPage::parse("https://www.nike.com/in/t/shoe-ABC123", html, &revealed);
        let images = resolve_images(&page, &nike, &context(None)).unwrap();

        assert_eq!(
            images,
            vec![
                "https://static.nike.com/a/images/t_default/one.png?width=1728&height=1728",
                "https://static.nike.com/a/images/t_default/two.png?width=1728&height=1728",
            ]
        );
    }

    #[test]
    fn test_structured_data_fallback_and_reject() {
        let mut westside = policy();
        westside.high_res = &[("media-gallery img", "src")];
        westside.fallback = &[];
        westside.srcset = &[];
        westside.allow_hosts = &["cdn.shopify.com"];
        westside.min_segment_len = None;
        westside.junk_suffixes = &[];
        westside.reject = Some(r"\d{3}_\d+_\d+copy");
        westside.rendition = Some("?v=1&width=1200");
        westside.structured_data = true;
        westside.color = ColorStrategy::Ignore;

        let html = r#"
            <media-gallery><img src="//cdn.shopify.com/s/files/301008799001_5_20copy.jpg"></media-gallery>
            <script type="application/ld+json">
                {"@type": "Product", "image": ["//cdn.shopify.com/s/files/top_front.jpg", "https://elsewhere.example/x.jpg"]}
            </script>
        "#;
        let page = ProductPage::parse("https://www.westside.com/products/top-300", html, &[]);
        let images = resolve_images(&page, &westside, &context(None)).unwrap();

        assert_eq!(images, vec!["https://cdn.shopify.com/s/files/top_front.jpg?v=1&width=1200"]);
    }
}
