//! Sitemap export
//!
//! Renders fetched pages as a sitemap in one of three formats:
//! - `xml`: a sitemaps.org `<urlset>`
//! - `html`: a standalone page with a Title / Category / URL table
//! - `csv`: `Title,Category,URL` rows, CRLF terminated

use crate::output::traits::{OutputError, OutputResult, PageResult};
use crate::storage::PageRecord;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use url::Url;

const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xml,
    Html,
    Csv,
}

impl ExportFormat {
    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "html" => Ok(Self::Html),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown export format '{}' (expected xml, html or csv)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One sitemap row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitemapEntry {
    /// Page title, or the URL when the page had none
    #[serde(rename = "Title")]
    pub title: String,
    /// First path segment; empty for the root
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl SitemapEntry {
    pub fn new(url: &str, title: Option<&str>) -> Self {
        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(url)
                .to_string(),
            category: category_of(url),
            url: url.to_string(),
        }
    }
}

impl From<&PageResult> for SitemapEntry {
    fn from(page: &PageResult) -> Self {
        Self::new(page.url().as_str(), page.title.as_deref())
    }
}

impl From<&PageRecord> for SitemapEntry {
    fn from(page: &PageRecord) -> Self {
        Self::new(&page.url, page.title.as_deref())
    }
}

/// First path segment of a URL
pub fn category_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path()
                .trim_matches('/')
                .split('/')
                .next()
                .map(str::to_string)
        })
        .unwrap_or_default()
}

/// Renders entries in the requested format
pub fn render(entries: &[SitemapEntry], format: ExportFormat) -> OutputResult<String> {
    match format {
        ExportFormat::Xml => Ok(render_xml(entries)),
        ExportFormat::Html => Ok(render_html(entries)),
        ExportFormat::Csv => render_csv(entries),
    }
}

pub fn render_xml(entries: &[SitemapEntry]) -> String {
    let mut lines = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        format!(r#"<urlset xmlns="{}">"#, SITEMAP_NAMESPACE),
    ];
    for entry in entries {
        lines.push("  <url>".to_string());
        lines.push(format!("    <loc>{}</loc>", html_escape::encode_text(&entry.url)));
        lines.push("  </url>".to_string());
    }
    lines.push("</urlset>".to_string());
    lines.join("\n")
}

pub fn render_html(entries: &[SitemapEntry]) -> String {
    let mut html = vec![
        "<!doctype html><meta charset=\"utf-8\"><title>Sitemap</title>".to_string(),
        "<style>body{font-family:system-ui,Arial} table{border-collapse:collapse} td,th{border:1px solid #ccc;padding:6px 10px}</style>".to_string(),
        "<h1>Sitemap</h1>".to_string(),
        "<table><thead><tr><th>Title</th><th>Category</th><th>URL</th></tr></thead><tbody>".to_string(),
    ];
    for entry in entries {
        html.push(format!(
            "<tr><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td></tr>",
            html_escape::encode_text(&entry.title),
            html_escape::encode_text(&entry.category),
            html_escape::encode_double_quoted_attribute(&entry.url),
            html_escape::encode_text(&entry.url),
        ));
    }
    html.push("</tbody></table>".to_string());
    html.join("\n")
}

pub fn render_csv(entries: &[SitemapEntry]) -> OutputResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    for entry in entries {
        writer.serialize(entry)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| OutputError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| OutputError::Format(e.to_string()))
}

/// Renders and writes an export file
pub fn write_export(entries: &[SitemapEntry], format: ExportFormat, path: &Path) -> OutputResult<()> {
    if entries.is_empty() {
        return Err(OutputError::Write("no pages to export".to_string()));
    }
    fs::write(path, render(entries, format)?)?;
    Ok(())
}
