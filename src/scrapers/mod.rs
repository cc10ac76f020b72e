//! Site-specific extractors

pub mod marks_spencer;
pub mod nike;
pub mod uniqlo;
pub mod westside;

use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;

use crate::traits::{SiteExtractor, SiteProfile};

pub use marks_spencer::MarksSpencerExtractor;
pub use nike::NikeExtractor;
pub use uniqlo::UniqloExtractor;
pub use westside::WestsideExtractor;

/// Supported retail sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Site {
    Uniqlo,
    Nike,
    MarksAndSpencer,
    Westside,
}

impl Site {
    pub fn profile(self) -> Result<SiteProfile> {
        match self {
            Self::Uniqlo => uniqlo::profile(),
            Self::Nike => nike::profile(),
            Self::MarksAndSpencer => marks_spencer::profile(),
            Self::Westside => westside::profile(),
        }
    }

    pub fn extractor(self, profile: SiteProfile) -> Arc<dyn SiteExtractor> {
        match self {
            Self::Uniqlo => Arc::new(UniqloExtractor::new(profile)),
            Self::Nike => Arc::new(NikeExtractor::new(profile)),
            Self::MarksAndSpencer => Arc::new(MarksSpencerExtractor::new(profile)),
            Self::Westside => Arc::new(WestsideExtractor::new(profile)),
        }
    }
}

/// The URL up to (not including) its query string
pub(crate) fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Last non-empty path segment of a URL or href
pub(crate) fn last_segment(url: &str) -> &str {
    strip_query(url)
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
}

/// "dusty pink" -> "Dusty Pink"
pub(crate) fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
