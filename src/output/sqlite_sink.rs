//! SQLite-based result sink
//!
//! This module provides a sink that records crawl events directly to the
//! SQLite storage backend, one run per crawl.

use crate::crawler::UrlRecord;
use crate::output::traits::{OutputError, OutputResult, PageFailure, PageResult, ResultSink};
use crate::state::{PageStatus, SkipReason};
use crate::storage::{PageRecord, RunStatus, Storage};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::error;

/// Persists pages, failures, skips and links of one run
///
/// Write errors are logged and counted; they never reach the crawl.
pub struct SqliteSink {
    storage: Arc<Mutex<dyn Storage>>,
    run_id: i64,
    write_errors: AtomicUsize,
}

impl SqliteSink {
    /// Creates a new SQLite sink
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `run_id` - The run created for this crawl
    pub fn new(storage: Arc<Mutex<dyn Storage>>, run_id: i64) -> Self {
        Self {
            storage,
            run_id,
            write_errors: AtomicUsize::new(0),
        }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Number of events that could not be written
    pub fn write_errors(&self) -> usize {
        self.write_errors.load(Ordering::SeqCst)
    }

    fn storage(&self) -> OutputResult<MutexGuard<'_, dyn Storage + 'static>> {
        self.storage
            .lock()
            .map_err(|e| OutputError::Storage(format!("Failed to lock storage: {}", e)))
    }

    fn base_record(&self, record: &UrlRecord, status: PageStatus) -> PageRecord {
        PageRecord {
            id: 0,
            run_id: self.run_id,
            url: record.url.to_string(),
            final_url: None,
            domain: record.domain.clone(),
            depth: record.depth,
            parent_url: record.parent.as_ref().map(|p| p.to_string()),
            status,
            http_status: None,
            content_type: None,
            title: None,
            metadata: None,
            attempts: 0,
            elapsed_ms: None,
            error_message: None,
            recorded_at: Utc::now().to_rfc3339(),
        }
    }

    fn record_page(&self, page: &PageResult) -> OutputResult<()> {
        let metadata = page
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| OutputError::Format(e.to_string()))?;

        let row = PageRecord {
            final_url: Some(page.final_url.to_string()),
            http_status: Some(page.status),
            content_type: page.content_type.clone(),
            title: page.title.clone(),
            metadata,
            attempts: page.attempts,
            elapsed_ms: Some(page.elapsed.as_millis() as u64),
            error_message: page.parse_error.clone(),
            recorded_at: page.fetched_at.to_rfc3339(),
            ..self.base_record(&page.record, PageStatus::Fetched)
        };
        let links: Vec<String> = page.links.iter().map(|u| u.to_string()).collect();

        let mut storage = self.storage()?;
        storage.insert_page(&row)?;
        if !links.is_empty() {
            storage.insert_links(self.run_id, &row.url, &links)?;
        }
        Ok(())
    }

    fn record_failure(&self, failure: &PageFailure) -> OutputResult<()> {
        let row = PageRecord {
            http_status: failure.kind.http_status(),
            attempts: failure.attempts,
            error_message: Some(failure.kind.to_string()),
            recorded_at: failure.failed_at.to_rfc3339(),
            ..self.base_record(&failure.record, failure.kind.status())
        };
        self.storage()?.insert_page(&row)?;
        Ok(())
    }

    fn record_skip(&self, record: &UrlRecord, reason: SkipReason) -> OutputResult<()> {
        let row = PageRecord {
            error_message: Some(reason.to_string()),
            ..self.base_record(record, PageStatus::from(reason))
        };
        self.storage()?.insert_page(&row)?;
        Ok(())
    }

    fn finish(&self, status: RunStatus) -> OutputResult<()> {
        self.storage()?.finish_run(self.run_id, status)?;
        Ok(())
    }

    fn report(&self, what: &str, result: OutputResult<()>) {
        if let Err(e) = result {
            self.write_errors.fetch_add(1, Ordering::SeqCst);
            error!("Failed to record {}: {}", what, e);
        }
    }
}

impl ResultSink for SqliteSink {
    fn on_page_fetched(&self, page: &PageResult) {
        self.report("page", self.record_page(page));
    }

    fn on_page_failed(&self, failure: &PageFailure) {
        self.report("failure", self.record_failure(failure));
    }

    fn on_page_skipped(&self, record: &UrlRecord, reason: SkipReason) {
        self.report("skipped page", self.record_skip(record, reason));
    }

    fn on_crawl_complete(&self) {
        self.report("run completion", self.finish(RunStatus::Completed));
    }

    fn on_crawl_aborted(&self) {
        self.report("run abort", self.finish(RunStatus::Aborted));
    }
}
