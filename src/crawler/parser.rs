//! HTML parser for extracting links and metadata
//!
//! This module handles parsing fetched pages to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title
//! - Optional metadata, tables and JSON blocks (see `metadata`)

use crate::config::ExtractConfig;
use crate::crawler::frontier::UrlRecord;
use crate::crawler::metadata::{extract_metadata, PageMetadata};
use crate::url::{normalize_parsed, LinkFilter};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static A_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("hardcoded selector is valid"));
static CANONICAL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel='canonical'][href]").expect("hardcoded selector is valid")
});
static BASE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("hardcoded selector is valid"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("hardcoded selector is valid"));

/// Extracted information from one fetched page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// In-policy links, normalized, one record per distinct URL
    pub links: Vec<UrlRecord>,

    pub metadata: Option<PageMetadata>,

    /// Set when the body could not be parsed; `links` is then empty
    pub parse_error: Option<String>,
}

/// Parses a fetched body
///
/// A body that is not valid UTF-8 yields a `parse_error` and no links.
///
/// # Arguments
///
/// * `body` - Raw response body
/// * `page` - Record of the fetched page (children get `page.depth + 1`)
/// * `base_url` - URL the body was served from, after redirects
/// * `filter` - Link policy
/// * `extract` - Which optional extractions to run
pub fn parse_page(
    body: &[u8],
    page: &UrlRecord,
    base_url: &Url,
    filter: &LinkFilter,
    extract: &ExtractConfig,
) -> ParsedPage {
    match std::str::from_utf8(body) {
        Ok(html) => parse_html(html, page, base_url, filter, extract),
        Err(e) => ParsedPage {
            parse_error: Some(format!("body is not valid UTF-8: {}", e)),
            ..ParsedPage::default()
        },
    }
}

/// Parses HTML content and extracts links and metadata
///
/// # Example
///
/// ```
/// use spider_scraper::config::ExtractConfig;
/// use spider_scraper::crawler::parse_html;
/// use spider_scraper::{LinkFilter, UrlRecord};
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let page = UrlRecord::seed(base.clone());
/// let parsed = parse_html(html, &page, &base, &LinkFilter::allow_all(), &ExtractConfig::default());
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url.as_str(), "https://example.com/page");
/// assert_eq!(parsed.links[0].depth, 1);
/// ```
pub fn parse_html(
    html: &str,
    page: &UrlRecord,
    base_url: &Url,
    filter: &LinkFilter,
    extract: &ExtractConfig,
) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let metadata = extract_metadata(&document, base_url, extract);
    let links = links(&document, base_url, page, filter).collect();

    ParsedPage {
        title,
        links,
        metadata,
        parse_error: None,
    }
}

/// Extracts in-policy links from raw HTML
///
/// Each record has depth `parent_depth + 1` and `base_url` as its parent.
pub fn extract_links(
    html: &str,
    base_url: &Url,
    parent_depth: u32,
    filter: &LinkFilter,
) -> Vec<UrlRecord> {
    let document = Html::parse_document(html);
    let parent = UrlRecord::new(base_url.clone(), parent_depth, None);
    links(&document, base_url, &parent, filter).collect()
}

/// Lazily yields the in-policy links of a parsed document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:`, `data:` and other non-HTTP(S) links
/// - Fragment-only anchors and unparseable hrefs
/// - URLs rejected by the link filter
///
/// Relative links resolve against `<base href>` when present, else `base_url`.
pub fn links<'a>(
    document: &'a Html,
    base_url: &Url,
    page: &'a UrlRecord,
    filter: &'a LinkFilter,
) -> impl Iterator<Item = UrlRecord> + 'a {
    let base = document_base(document, base_url);
    let mut seen = HashSet::new();

    let anchors = document
        .select(&A_SELECTOR)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"));
    let canonical = document
        .select(&CANONICAL_SELECTOR)
        .filter_map(|element| element.value().attr("href"));

    anchors
        .chain(canonical)
        .filter_map(move |href| resolve_link(href, &base))
        .filter(move |url| filter.allows(url))
        .filter(move |url| seen.insert(url.as_str().to_string()))
        .map(move |url| page.child(url))
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Effective base URL, honouring `<base href>`
fn document_base(document: &Html, base_url: &Url) -> Url {
    document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| base_url.join(href.trim()).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or_else(|| base_url.clone())
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_parsed(absolute).ok()
}
