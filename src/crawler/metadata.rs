//! Optional page content extraction
//!
//! Each part is switched on in `[extract]`:
//! - `metadata`: meta tags, charset, Open Graph and Twitter cards, canonical link
//! - `tables`: header row and up to [`MAX_TABLE_ROWS`] body rows per table
//! - `json`: JSON-LD scripts, inline JSON scripts and JSON-valued attributes
//! - `css`: stylesheet links, `<style>` blocks and inline `style` attributes
//! - `scripts`: external script URLs, inline script bodies and `on*` handlers
//! - `images`: image URLs from `src`, `data-src` or `data-lazy-src`
//!
//! Asset URLs are resolved against the page URL and recorded only; nothing
//! is downloaded. `data:` URIs are skipped.

use crate::config::ExtractConfig;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// Body rows kept per table
pub const MAX_TABLE_ROWS: usize = 100;

/// JSON blocks kept per page
const MAX_JSON_BLOCKS: usize = 64;

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("hardcoded selector is valid"));
static CANONICAL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel='canonical'][href]").expect("hardcoded selector is valid")
});
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("hardcoded selector is valid"));
static THEAD_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead th, thead td").expect("hardcoded selector is valid"));
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("hardcoded selector is valid"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("hardcoded selector is valid"));
static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("hardcoded selector is valid"));
static ALL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("*").expect("hardcoded selector is valid"));
static STYLESHEET_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel~='stylesheet'][href]").expect("hardcoded selector is valid")
});
static STYLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("style").expect("hardcoded selector is valid"));
static STYLED_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[style]").expect("hardcoded selector is valid"));
static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("hardcoded selector is valid"));

/// Image attributes in lookup order; lazy loaders keep the real URL in `data-*`
const IMAGE_SOURCE_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy-src"];

/// One extracted HTML table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// `style` attribute on an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineStyle {
    pub element: String,
    pub css: String,
}

/// `<script src>` reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalScript {
    pub url: String,
    #[serde(rename = "type")]
    pub script_type: Option<String>,
}

/// Body of a `<script>` without `src`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineScript {
    #[serde(rename = "type")]
    pub script_type: Option<String>,
    pub code: String,
}

/// An `on*` attribute such as `onclick`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventHandler {
    pub element: String,
    pub attribute: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub url: String,
    pub alt: Option<String>,
}

/// Structured data pulled from a page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMetadata {
    /// `name` / `property` / `http-equiv` → `content`
    pub meta: BTreeMap<String, String>,
    pub charset: Option<String>,
    /// `og:*` properties, keyed without the prefix
    pub open_graph: BTreeMap<String, String>,
    /// `twitter:*` properties, keyed without the prefix
    pub twitter: BTreeMap<String, String>,
    pub canonical: Option<String>,
    pub tables: Vec<Table>,
    pub json: Vec<serde_json::Value>,
    pub stylesheets: Vec<String>,
    /// `<style>` element bodies
    pub style_blocks: Vec<String>,
    pub inline_styles: Vec<InlineStyle>,
    pub scripts: Vec<ExternalScript>,
    pub inline_scripts: Vec<InlineScript>,
    pub event_handlers: Vec<EventHandler>,
    pub images: Vec<ImageRef>,
}

impl PageMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Runs the enabled extractions, returning `None` when all are disabled
pub fn extract_metadata(
    document: &Html,
    base_url: &Url,
    config: &ExtractConfig,
) -> Option<PageMetadata> {
    if !(config.metadata
        || config.tables
        || config.json
        || config.css
        || config.scripts
        || config.images)
    {
        return None;
    }

    let mut metadata = PageMetadata::default();
    if config.metadata {
        extract_meta_tags(document, &mut metadata);
        metadata.canonical = document
            .select(&CANONICAL_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| base_url.join(href.trim()).ok())
            .map(|url| url.to_string());
    }
    if config.tables {
        metadata.tables = extract_tables(document);
    }
    if config.json {
        metadata.json = extract_json_blocks(document);
    }
    if config.css {
        extract_css(document, base_url, &mut metadata);
    }
    if config.scripts {
        extract_scripts(document, base_url, &mut metadata);
    }
    if config.images {
        metadata.images = extract_images(document, base_url);
    }
    Some(metadata)
}

fn extract_meta_tags(document: &Html, metadata: &mut PageMetadata) {
    for element in document.select(&META_SELECTOR) {
        let attrs = element.value();

        if let Some(charset) = attrs.attr("charset") {
            metadata.charset = Some(charset.trim().to_string());
        }

        let key = attrs
            .attr("name")
            .or_else(|| attrs.attr("property"))
            .or_else(|| attrs.attr("http-equiv"));
        let (Some(key), Some(content)) = (key, attrs.attr("content")) else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let content = content.trim().to_string();

        if let Some(og) = key.strip_prefix("og:") {
            metadata.open_graph.insert(og.to_string(), content.clone());
        } else if let Some(tw) = key.strip_prefix("twitter:") {
            metadata.twitter.insert(tw.to_string(), content.clone());
        }
        metadata.meta.insert(key, content);
    }
}

/// Extracts tables; headers come from `<thead>`, else from a leading row of `<th>` cells
pub fn extract_tables(document: &Html) -> Vec<Table> {
    document
        .select(&TABLE_SELECTOR)
        .map(|table| {
            let mut headers: Vec<String> = table.select(&THEAD_CELL_SELECTOR).map(cell_text).collect();
            let mut rows = table
                .select(&ROW_SELECTOR)
                .filter(|row| !in_thead(row))
                .map(|row| row.select(&CELL_SELECTOR).map(cell_text).collect::<Vec<_>>())
                .filter(|cells| !cells.is_empty());

            if headers.is_empty() {
                let first_is_header = table
                    .select(&ROW_SELECTOR)
                    .find(|row| !in_thead(row) && row.select(&CELL_SELECTOR).next().is_some())
                    .map(|row| {
                        row.select(&CELL_SELECTOR)
                            .all(|cell| cell.value().name() == "th")
                    })
                    .unwrap_or(false);
                if first_is_header {
                    headers = rows.next().unwrap_or_default();
                }
            }

            Table {
                headers,
                rows: rows.take(MAX_TABLE_ROWS).collect(),
            }
        })
        .filter(|table| !(table.headers.is_empty() && table.rows.is_empty()))
        .collect()
}

fn in_thead(row: &ElementRef<'_>) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|el| el.value().name() != "table")
        .any(|el| el.value().name() == "thead")
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collects JSON-LD, inline JSON scripts and attributes holding JSON objects or arrays
pub fn extract_json_blocks(document: &Html) -> Vec<serde_json::Value> {
    let mut blocks = Vec::new();

    for script in document.select(&SCRIPT_SELECTOR) {
        let body = script.text().collect::<String>();
        let is_ld = script
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"));
        if is_ld || looks_like_json(&body) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(body.trim()) {
                blocks.push(value);
            }
        }
    }

    for element in document.select(&ALL_SELECTOR) {
        for (_, value) in element.value().attrs() {
            if !looks_like_json(value) {
                continue;
            }
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(value.trim()) {
                if parsed.is_object() || parsed.is_array() {
                    blocks.push(parsed);
                }
            }
        }
    }

    blocks.truncate(MAX_JSON_BLOCKS);
    blocks
}

fn looks_like_json(text: &str) -> bool {
    let t = text.trim();
    (t.starts_with('{') && t.ends_with('}')) || (t.starts_with('[') && t.ends_with(']'))
}

fn extract_css(document: &Html, base_url: &Url, metadata: &mut PageMetadata) {
    for link in document.select(&STYLESHEET_SELECTOR) {
        if let Some(url) = link.value().attr("href").and_then(|h| resolve_asset(base_url, h)) {
            push_unique(&mut metadata.stylesheets, url);
        }
    }

    metadata.style_blocks = document
        .select(&STYLE_SELECTOR)
        .map(|style| style.text().collect::<String>().trim().to_string())
        .filter(|css| !css.is_empty())
        .collect();

    metadata.inline_styles = document
        .select(&STYLED_SELECTOR)
        .filter_map(|el| {
            let css = el.value().attr("style")?.trim();
            (!css.is_empty()).then(|| InlineStyle {
                element: el.value().name().to_string(),
                css: css.to_string(),
            })
        })
        .collect();
}

fn extract_scripts(document: &Html, base_url: &Url, metadata: &mut PageMetadata) {
    for script in document.select(&SCRIPT_SELECTOR) {
        let attrs = script.value();
        let script_type = attrs.attr("type").map(|t| t.trim().to_string());

        match attrs.attr("src") {
            Some(src) => {
                let Some(url) = resolve_asset(base_url, src) else {
                    continue;
                };
                if !metadata.scripts.iter().any(|s| s.url == url) {
                    metadata.scripts.push(ExternalScript { url, script_type });
                }
            }
            None => {
                let code = script.text().collect::<String>().trim().to_string();
                if !code.is_empty() {
                    metadata.inline_scripts.push(InlineScript { script_type, code });
                }
            }
        }
    }

    for element in document.select(&ALL_SELECTOR) {
        for (name, value) in element.value().attrs() {
            if !is_event_attribute(name) || value.trim().is_empty() {
                continue;
            }
            metadata.event_handlers.push(EventHandler {
                element: element.value().name().to_string(),
                attribute: name.to_string(),
                code: value.trim().to_string(),
            });
        }
    }
}

/// Lists image URLs in document order, each once
pub fn extract_images(document: &Html, base_url: &Url) -> Vec<ImageRef> {
    let mut images: Vec<ImageRef> = Vec::new();
    for img in document.select(&IMG_SELECTOR) {
        let attrs = img.value();
        let Some(url) = IMAGE_SOURCE_ATTRS
            .iter()
            .filter_map(|name| attrs.attr(name))
            .find_map(|raw| resolve_asset(base_url, raw))
        else {
            continue;
        };
        if images.iter().any(|image| image.url == url) {
            continue;
        }
        images.push(ImageRef {
            url,
            alt: attrs
                .attr("alt")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(str::to_string),
        });
    }
    images
}

fn is_event_attribute(name: &str) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..].bytes().all(|b| b.is_ascii_lowercase())
}

fn resolve_asset(base_url: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
        return None;
    }
    base_url.join(raw).ok().map(|url| url.to_string())
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
