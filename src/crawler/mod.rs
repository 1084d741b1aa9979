//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawl engine, including:
//! - The deduplicating breadth-first frontier
//! - HTTP fetching with retry and backoff
//! - HTML parsing, link extraction and optional metadata extraction
//! - The worker pool and its lifecycle handle
//! - Overall session coordination

mod coordinator;
mod fetcher;
mod frontier;
pub mod metadata;
mod parser;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{build_default_headers, build_http_client, FetchOutcome, FetchedPage, Fetcher};
pub use frontier::{Dequeued, Frontier, InFlight, UrlRecord};
pub use metadata::{
    EventHandler, ExternalScript, ImageRef, InlineScript, InlineStyle, PageMetadata, Table,
};
pub use parser::{extract_links, links, parse_html, parse_page, ParsedPage};
pub use scheduler::{politeness_delay, CrawlHandle, Scheduler, SchedulerOptions};
