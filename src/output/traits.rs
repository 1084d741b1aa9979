//! Result sink trait and the records it receives
//!
//! This module defines the trait interface through which the crawl engine
//! reports every page outcome, plus the record types passed to it.

use crate::crawler::metadata::PageMetadata;
use crate::crawler::UrlRecord;
use crate::state::{FailureKind, SkipReason};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<crate::storage::StorageError> for OutputError {
    fn from(e: crate::storage::StorageError) -> Self {
        OutputError::Storage(e.to_string())
    }
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct PageResult {
    /// The frontier record that was dispatched
    pub record: UrlRecord,

    /// URL the body was served from, after redirects
    pub final_url: Url,

    /// HTTP status code of the final response
    pub status: u16,

    pub content_type: Option<String>,

    pub body: Vec<u8>,

    /// The page title (from <title> tag)
    pub title: Option<String>,

    pub metadata: Option<PageMetadata>,

    /// In-policy links found on the page
    pub links: Vec<Url>,

    /// Attempts the fetch needed, including the successful one
    pub attempts: u32,

    /// Wall time of the fetch across all attempts
    pub elapsed: Duration,

    pub fetched_at: DateTime<Utc>,

    /// Set when the body could not be parsed as HTML
    pub parse_error: Option<String>,
}

impl PageResult {
    pub fn url(&self) -> &Url {
        &self.record.url
    }

    pub fn depth(&self) -> u32 {
        self.record.depth
    }
}

/// A page whose fetch failed after all attempts
#[derive(Debug, Clone)]
pub struct PageFailure {
    pub record: UrlRecord,
    pub kind: FailureKind,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl PageFailure {
    pub fn new(record: UrlRecord, kind: FailureKind, attempts: u32) -> Self {
        Self {
            record,
            kind,
            attempts,
            failed_at: Utc::now(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.record.url
    }
}

/// Everything a sink can observe, as a value
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    PageFetched(Box<PageResult>),
    PageFailed(PageFailure),
    PageSkipped { record: UrlRecord, reason: SkipReason },
    Progress { completed: usize, queued: usize },
    CrawlComplete,
    CrawlAborted,
}

impl CrawlEvent {
    /// True for the final event of a crawl
    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlEvent::CrawlComplete | CrawlEvent::CrawlAborted)
    }
}

/// Receives crawl outcomes
///
/// Calls may arrive concurrently from several workers. `on_crawl_complete`
/// or `on_crawl_aborted` is called exactly once, after every page event.
/// Sinks own their failure handling: nothing they do can fail the crawl.
pub trait ResultSink: Send + Sync {
    fn on_page_fetched(&self, page: &PageResult);

    fn on_page_failed(&self, failure: &PageFailure);

    /// A URL that was dequeued but not fetched
    fn on_page_skipped(&self, _record: &UrlRecord, _reason: SkipReason) {}

    /// `completed` pages finished so far, `queued` still waiting
    fn on_progress(&self, _completed: usize, _queued: usize) {}

    fn on_crawl_complete(&self);

    fn on_crawl_aborted(&self);
}
