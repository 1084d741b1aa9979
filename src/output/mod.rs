//! Output module for crawl results
//!
//! This module handles:
//! - The `ResultSink` interface the crawl engine reports through
//! - In-memory, channel, fan-out and SQLite sinks
//! - Sitemap export (XML, HTML, CSV)
//! - Crawl statistics from the database

pub mod export;
mod sinks;
mod sqlite_sink;
pub mod stats;
mod traits;

pub use export::{write_export, ExportFormat, SitemapEntry};
pub use sinks::{ChannelSink, FanoutSink, MemorySink};
pub use sqlite_sink::SqliteSink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{CrawlEvent, OutputError, OutputResult, PageFailure, PageResult, ResultSink};

use crate::state::PageStatus;
use crate::storage::Storage;
use crate::SpiderError;

/// Loads the fetched pages of the most recent run as sitemap rows
///
/// # Arguments
///
/// * `storage` - The storage backend containing crawl data
pub fn load_sitemap_entries(storage: &dyn Storage) -> Result<Vec<SitemapEntry>, SpiderError> {
    let run = storage
        .get_latest_run()?
        .ok_or_else(|| SpiderError::Storage("No crawl runs found in database".to_string()))?;

    let entries = storage
        .get_pages_by_status(run.id, PageStatus::Fetched)?
        .iter()
        .map(SitemapEntry::from)
        .collect();
    Ok(entries)
}
