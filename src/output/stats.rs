//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! per-run crawl statistics from the storage layer.

use crate::state::PageStatus;
use crate::storage::{RunRecord, Storage};
use crate::SpiderError;
use std::collections::HashMap;

/// Crawl statistics summary for one run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub run: RunRecord,

    /// Total number of page outcomes recorded
    pub total_pages: u64,

    /// Count of pages by status
    pub pages_by_status: HashMap<PageStatus, u64>,

    /// HTTP error statuses and their counts
    pub http_errors: HashMap<u16, u64>,

    /// Number of unique domains encountered
    pub unique_domains: u64,

    /// Total number of links discovered
    pub total_links: u64,

    /// Deepest page reached, if any
    pub max_depth: Option<u32>,

    /// Page count per depth
    pub depth_breakdown: HashMap<u32, u64>,
}

impl CrawlStatistics {
    pub fn count(&self, status: PageStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Pages that failed after all attempts
    pub fn failures(&self) -> u64 {
        self.pages_by_status
            .iter()
            .filter(|(status, _)| status.is_failure())
            .map(|(_, count)| count)
            .sum()
    }

    /// Share of recorded pages that were fetched, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        self.count(PageStatus::Fetched) as f64 / self.total_pages as f64 * 100.0
    }
}

/// Loads statistics for the most recent run
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(SpiderError)` - No run recorded, or a query failed
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, SpiderError> {
    let run = storage
        .get_latest_run()?
        .ok_or_else(|| SpiderError::Storage("No crawl runs found in database".to_string()))?;
    load_run_statistics(storage, run)
}

/// Loads statistics for a given run
pub fn load_run_statistics(
    storage: &dyn Storage,
    run: RunRecord,
) -> Result<CrawlStatistics, SpiderError> {
    let mut pages_by_status = HashMap::new();
    for status in PageStatus::all_statuses() {
        let count = storage.count_pages_by_status(run.id, status)?;
        if count > 0 {
            pages_by_status.insert(status, count);
        }
    }

    Ok(CrawlStatistics {
        total_pages: storage.count_total_pages(run.id)?,
        pages_by_status,
        http_errors: storage.get_http_error_summary(run.id)?,
        unique_domains: storage.count_unique_domains(run.id)?,
        total_links: storage.count_links(run.id)?,
        max_depth: storage.max_depth(run.id)?,
        depth_breakdown: storage.get_depth_breakdown(run.id)?,
        run,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run #{} ({})", stats.run.id, stats.run.status.to_db_string());
    println!("  Seed: {}", stats.run.seed_url);
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!();

    println!("Overview:");
    println!("  Total pages: {}", stats.total_pages);
    println!("  Unique domains: {}", stats.unique_domains);
    println!("  Total links found: {}", stats.total_links);
    match stats.max_depth {
        Some(depth) => println!("  Max depth reached: {}", depth),
        None => println!("  Max depth reached: -"),
    }
    println!();

    println!("Pages by Status:");
    let mut status_counts: Vec<_> = stats.pages_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = (*count as f64 / stats.total_pages.max(1) as f64) * 100.0;
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.http_errors.is_empty() {
        println!("HTTP Errors:");
        let mut errors: Vec<_> = stats.http_errors.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (status, count) in errors {
            println!("  {}: {}", status, count);
        }
        println!();
    }

    if !stats.depth_breakdown.is_empty() {
        println!("Pages by Depth:");
        let mut depths: Vec<_> = stats.depth_breakdown.iter().collect();
        depths.sort();
        for (depth, count) in depths {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages fetched)",
        stats.success_rate(),
        stats.count(PageStatus::Fetched),
        stats.total_pages
    );
}
