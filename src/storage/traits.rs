//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::PageStatus;
use crate::storage::{PageRecord, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writes take `&mut self`; callers sharing a backend across tasks wrap it
/// in a mutex.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `seed_url` - The crawl's seed URL
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, seed_url: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status of a run and stamps `finished_at`
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Page Management =====

    /// Records a page outcome; a second outcome for the same URL in the
    /// same run replaces the first
    ///
    /// # Returns
    ///
    /// The page row ID
    fn insert_page(&mut self, page: &PageRecord) -> StorageResult<i64>;

    /// Gets a page of a run by URL
    fn get_page_by_url(&self, run_id: i64, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Gets all pages of a run in a specific status, in insertion order
    fn get_pages_by_status(&self, run_id: i64, status: PageStatus)
        -> StorageResult<Vec<PageRecord>>;

    // ===== Link Management =====

    /// Inserts the outgoing links of a page, ignoring duplicates
    fn insert_links(&mut self, run_id: i64, from_url: &str, to_urls: &[String])
        -> StorageResult<()>;

    /// Gets all outgoing links from a page
    fn get_outgoing_links(&self, run_id: i64, from_url: &str) -> StorageResult<Vec<String>>;

    /// Counts the links of a run
    fn count_links(&self, run_id: i64) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Counts the pages of a run in a status
    fn count_pages_by_status(&self, run_id: i64, status: PageStatus) -> StorageResult<u64>;

    /// Gets the total page count of a run
    fn count_total_pages(&self, run_id: i64) -> StorageResult<u64>;

    /// Gets the count of unique domains of a run
    fn count_unique_domains(&self, run_id: i64) -> StorageResult<u64>;

    /// Gets the deepest recorded page of a run
    fn max_depth(&self, run_id: i64) -> StorageResult<Option<u32>>;

    /// Gets page count breakdown by depth
    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, u64>>;

    /// Gets the HTTP statuses of failed pages with their counts
    fn get_http_error_summary(&self, run_id: i64) -> StorageResult<HashMap<u16, u64>>;
}
