//! Fallback selector chains, price normalization and name composition

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::ExtractError;

static LEADING_CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:₹|\$|£|€|Rs\.?|INR)\s*").expect("currency regex"));
static LEADING_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:MRP|Price|Regular price)[\s:]*").expect("label regex"));
static TRAILING_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:incl\..*|MRP.*)").expect("suffix regex"));

/// A product page parsed once and queried many times
pub struct ProductPage<'a> {
    pub url: &'a str,
    pub body: &'a str,
    pub document: Html,
    /// Image sources a script-capable fetcher collected from the live gallery
    pub revealed_images: &'a [String],
}

impl<'a> ProductPage<'a> {
    pub fn parse(url: &'a str, body: &'a str, revealed_images: &'a [String]) -> Self {
        Self {
            url,
            body,
            document: Html::parse_document(body),
            revealed_images,
        }
    }
}

/// One alternative in a fallback chain
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    /// Trimmed text content of the first matching element that has any
    Text(&'static str),
    /// First non-empty value of an attribute on matching elements
    Attr(&'static str, &'static str),
    /// First match of a regex over the raw page source
    Pattern(&'static str),
}

impl Probe {
    pub fn evaluate(&self, page: &ProductPage<'_>) -> Result<Option<String>, ExtractError> {
        match *self {
            Self::Text(css) => {
                let selector = parse_selector(css)?;
                Ok(page.document.select(&selector).find_map(element_text))
            }
            Self::Attr(css, attr) => {
                let selector = parse_selector(css)?;
                Ok(page
                    .document
                    .select(&selector)
                    .find_map(|el| non_empty(el.value().attr(attr))))
            }
            Self::Pattern(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| ExtractError::Selector {
                    selector: pattern.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(regex.find(page.body).map(|m| m.as_str().trim().to_string()))
            }
        }
    }
}

/// Evaluates probes strictly in order and returns the first non-empty value.
///
/// Probes after the first hit are never evaluated, so a broken selector late
/// in a chain only surfaces when every earlier alternative missed.
pub fn first_match(page: &ProductPage<'_>, probes: &[Probe]) -> Result<Option<String>, ExtractError> {
    for probe in probes {
        if let Some(value) = probe.evaluate(page)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

pub fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        reason: format!("{e:?}"),
    })
}

pub fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<String>();
    non_empty(Some(text.as_str()))
}

pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reduces rendered price text to a plain numeric-looking string.
///
/// Strips a leading currency token, a leading label such as `MRP:`, any
/// trailing `incl. ...`/`MRP ...` text and thousands separators. The pass is
/// repeated until the output is stable, so the result is a fixed point.
pub fn normalize_price(raw: &str) -> String {
    let mut current = normalize_price_once(raw);
    loop {
        let next = normalize_price_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_price_once(raw: &str) -> String {
    let without_currency = LEADING_CURRENCY.replace(raw.trim(), "");
    let without_label = LEADING_LABEL.replace(without_currency.trim(), "");
    let without_suffix = TRAILING_SUFFIX.replace(without_label.trim(), "");
    without_suffix.replace(',', "").trim().to_string()
}

/// Appends the color to the display name when the site asks for it
pub fn compose_name(base: &str, color_name: Option<&str>, suffix_color: bool) -> String {
    let base = base.trim();
    match color_name {
        Some(color) if suffix_color && !color.trim().is_empty() => format!("{base} - {}", color.trim()),
        _ => base.to_string(),
    }
}
