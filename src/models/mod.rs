//! Data models for product records and variant bookkeeping

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A single color variant of a product, as handed to the output sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub product_id: String,
    pub url: String,
    pub price: String,
    pub color_name: Option<String>,
    pub color_code: Option<String>,
    pub image_urls: Vec<String>,
    pub image_count: usize,
    pub image_url: Option<String>,
}

impl ProductRecord {
    /// Builds a record from already-extracted fields.
    ///
    /// The image list is deduplicated and sorted here, and `image_count` and
    /// `image_url` are derived from it, so every record leaving this
    /// constructor satisfies the count/first-image invariants.
    pub fn new(
        fields: ProductFields,
        context: &VariantContext,
        url: String,
        images: impl IntoIterator<Item = String>,
    ) -> Self {
        let image_urls: Vec<String> = images.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let image_count = image_urls.len();
        let image_url = image_urls.first().cloned();

        Self {
            name: fields.name,
            product_id: context.variant_id.clone(),
            url,
            price: fields.price,
            color_name: context.color_name.clone(),
            color_code: context.color_code.clone(),
            image_urls,
            image_count,
            image_url,
        }
    }
}

/// Name and price pulled from a product page, already composed and normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub price: String,
}

/// Where the data for a variant lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantTarget {
    /// The variant is fully described by the page that listed it
    SamePage,
    /// The variant needs its own request
    Fetch(String),
}

/// One color control found on a product page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCandidate {
    pub color_name: Option<String>,
    pub color_code: String,
    pub variant_id: String,
    pub target: VariantTarget,
}

/// Outcome of variant enumeration for a product page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantPlan {
    /// No usable color controls; the page is one colorless product
    Single { product_id: String },
    /// One entry per color, in DOM order
    Variants {
        base_id: String,
        candidates: Vec<VariantCandidate>,
        /// Whether these candidates count toward `total_variants_found`
        counted: bool,
    },
}

/// Identity of the variant being extracted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantContext {
    pub variant_id: String,
    pub base_id: String,
    pub color_name: Option<String>,
    pub color_code: Option<String>,
}

impl VariantContext {
    /// Context for a product without color variants
    pub fn single(product_id: &str) -> Self {
        Self {
            variant_id: product_id.to_string(),
            base_id: product_id.to_string(),
            color_name: None,
            color_code: None,
        }
    }

    /// Context for one enumerated color
    pub fn for_candidate(base_id: &str, candidate: &VariantCandidate) -> Self {
        Self {
            variant_id: candidate.variant_id.clone(),
            base_id: base_id.to_string(),
            color_name: candidate.color_name.clone(),
            color_code: Some(candidate.color_code.clone()),
        }
    }
}
