//! State module for tracking crawl progress
//!
//! This module defines the crawl lifecycle and the per-page outcome values.
//!
//! # Components
//!
//! - `CrawlState`: Lifecycle of a crawl session (idle, running, paused, completed, aborted)
//! - `PageStatus`: Recorded outcome of a single URL
//! - `FailureKind`: Classified terminal fetch failure
//! - `SkipReason`: Why a dequeued URL was not fetched

mod crawl_state;
mod page_status;

// Re-export main types
pub use crawl_state::CrawlState;
pub use page_status::{FailureKind, PageStatus, SkipReason};
