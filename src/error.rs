use thiserror::Error;

/// Failure reported by a page fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// Bucket key used when recording this failure in the run statistics
    pub fn classification(&self) -> String {
        match self {
            Self::Timeout { .. } => "Timeout Error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { url: url.to_string() }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Failure while turning a page into product records
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not extract {what} from URL: {url}")]
    PatternMiss { url: String, what: &'static str },

    #[error("Missing required fields: product_name or product_price")]
    MissingFields,

    #[error("invalid selector \"{selector}\": {reason}")]
    Selector { selector: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to parse sitemap {url}: {message}")]
    Parse { url: String, message: String },
}
