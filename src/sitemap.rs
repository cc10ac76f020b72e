//! Sitemap parsing and product URL discovery

use std::collections::VecDeque;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::SitemapError;
use crate::fetcher::{PageFetcher, PageRequest};
use crate::traits::SiteProfile;

/// Child sitemaps nested deeper than this are not followed
pub const MAX_SITEMAP_DEPTH: usize = 3;

/// Locations found in one sitemap document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// `<url><loc>` entries of a urlset
    pub urls: Vec<String>,
    /// `<sitemap><loc>` entries of a sitemap index
    pub sitemaps: Vec<String>,
    /// Parsing errors (non-fatal)
    pub errors: Vec<String>,
}

impl SitemapDocument {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.sitemaps.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Entry {
    Url,
    Sitemap,
}

/// Parse sitemap XML content
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut doc = SitemapDocument::default();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Element depth, and the depth of the open <url>/<sitemap> entry. Only a
    // <loc> directly inside the entry is its location; <image:loc> and other
    // extension children are nested one level deeper.
    let mut depth = 0usize;
    let mut entry: Option<(Entry, usize)> = None;
    let mut in_loc = false;
    let mut loc = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                match e.name().as_ref() {
                    b"url" if entry.is_none() => {
                        entry = Some((Entry::Url, depth));
                        loc.clear();
                    }
                    b"sitemap" if entry.is_none() => {
                        entry = Some((Entry::Sitemap, depth));
                        loc.clear();
                    }
                    b"loc" => in_loc = entry.is_some_and(|(_, at)| depth == at + 1),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"loc" => in_loc = false,
                    b"url" | b"sitemap" => {
                        if let Some((kind, at)) = entry
                            && at == depth
                        {
                            entry = None;
                            let target = match kind {
                                Entry::Url => &mut doc.urls,
                                Entry::Sitemap => &mut doc.sitemaps,
                            };
                            let url = loc.trim();
                            if !url.is_empty() {
                                target.push(url.to_string());
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(e)) if in_loc => {
                loc.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::CData(e)) if in_loc => {
                loc.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                doc.errors.push(format!("XML parse error: {}", e));
                break;
            }
            _ => {}
        }
    }

    doc
}

/// Product-page locations of a urlset, in document order
pub fn product_urls<'a>(doc: &'a SitemapDocument, pattern: &'a Regex) -> impl Iterator<Item = &'a str> + 'a {
    doc.urls
        .iter()
        .map(String::as_str)
        .filter(move |url| pattern.is_match(url))
}

/// Child sitemaps worth following; all of them when no marker is configured
pub fn child_sitemaps<'a>(doc: &'a SitemapDocument, marker: Option<&'a str>) -> impl Iterator<Item = &'a str> + 'a {
    doc.sitemaps
        .iter()
        .map(String::as_str)
        .filter(move |url| marker.is_none_or(|m| url.contains(m)))
}

/// Walks the site's sitemap tree and returns every matching product URL.
///
/// # Errors
/// * `SitemapError::Fetch` - the seed sitemap could not be fetched
/// * `SitemapError::Parse` - the seed sitemap is not a sitemap at all
pub async fn discover_product_urls(
    fetcher: &dyn PageFetcher,
    profile: &SiteProfile,
) -> Result<Vec<String>, SitemapError> {
    info!("Reading {} sitemap: {}", profile.name, profile.sitemap_url);

    let mut products = Vec::new();
    let mut queue = VecDeque::from([(profile.sitemap_url.clone(), 0usize)]);

    while let Some((url, depth)) = queue.pop_front() {
        let is_seed = depth == 0;
        let page = match fetcher.fetch(PageRequest::new(&url)).await {
            Ok(page) => page,
            Err(failure) if is_seed => return Err(failure.error.into()),
            Err(failure) => {
                warn!("Skipping child sitemap {}: {}", url, failure.error);
                continue;
            }
        };

        let doc = parse_sitemap(&page.body);
        if !doc.errors.is_empty() {
            if is_seed && doc.is_empty() {
                return Err(SitemapError::Parse {
                    url,
                    message: doc.errors.join("; "),
                });
            }
            warn!("Sitemap {} parsed with errors: {}", url, doc.errors.join("; "));
        }

        let before = products.len();
        products.extend(product_urls(&doc, &profile.product_pattern).map(str::to_string));
        debug!("{} product URLs in {}", products.len() - before, url);

        if depth + 1 < MAX_SITEMAP_DEPTH {
            for child in child_sitemaps(&doc, profile.child_sitemap_marker.as_deref()) {
                queue.push_back((child.to_string(), depth + 1));
            }
        } else if !doc.sitemaps.is_empty() {
            warn!("Not following {} child sitemaps of {}: depth limit reached", doc.sitemaps.len(), url);
        }
    }

    info!("Found {} product URLs for {}", products.len(), profile.name);
    Ok(products)
}
