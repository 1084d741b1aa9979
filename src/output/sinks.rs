//! In-process result sinks

use crate::crawler::UrlRecord;
use crate::output::traits::{CrawlEvent, PageFailure, PageResult, ResultSink};
use crate::state::SkipReason;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Forwards every event over an unbounded channel
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CrawlEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CrawlEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CrawlEvent) {
        if self.tx.send(event).is_err() {
            debug!("Crawl event receiver dropped");
        }
    }
}

impl ResultSink for ChannelSink {
    fn on_page_fetched(&self, page: &PageResult) {
        self.send(CrawlEvent::PageFetched(Box::new(page.clone())));
    }

    fn on_page_failed(&self, failure: &PageFailure) {
        self.send(CrawlEvent::PageFailed(failure.clone()));
    }

    fn on_page_skipped(&self, record: &UrlRecord, reason: SkipReason) {
        self.send(CrawlEvent::PageSkipped {
            record: record.clone(),
            reason,
        });
    }

    fn on_progress(&self, completed: usize, queued: usize) {
        self.send(CrawlEvent::Progress { completed, queued });
    }

    fn on_crawl_complete(&self) {
        self.send(CrawlEvent::CrawlComplete);
    }

    fn on_crawl_aborted(&self) {
        self.send(CrawlEvent::CrawlAborted);
    }
}

/// Keeps every outcome in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pages: Mutex<Vec<PageResult>>,
    failures: Mutex<Vec<PageFailure>>,
    skipped: Mutex<Vec<(UrlRecord, SkipReason)>>,
    completed: AtomicUsize,
    aborted: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the fetched pages, in emission order
    pub fn pages(&self) -> Vec<PageResult> {
        lock(&self.pages).clone()
    }

    pub fn failures(&self) -> Vec<PageFailure> {
        lock(&self.failures).clone()
    }

    pub fn skipped(&self) -> Vec<(UrlRecord, SkipReason)> {
        lock(&self.skipped).clone()
    }

    /// Times `on_crawl_complete` was called
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Times `on_crawl_aborted` was called
    pub fn aborted_count(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }
}

impl ResultSink for MemorySink {
    fn on_page_fetched(&self, page: &PageResult) {
        lock(&self.pages).push(page.clone());
    }

    fn on_page_failed(&self, failure: &PageFailure) {
        lock(&self.failures).push(failure.clone());
    }

    fn on_page_skipped(&self, record: &UrlRecord, reason: SkipReason) {
        lock(&self.skipped).push((record.clone(), reason));
    }

    fn on_crawl_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_crawl_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Forwards each event to every inner sink, in order
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultSink for FanoutSink {
    fn on_page_fetched(&self, page: &PageResult) {
        self.sinks.iter().for_each(|s| s.on_page_fetched(page));
    }

    fn on_page_failed(&self, failure: &PageFailure) {
        self.sinks.iter().for_each(|s| s.on_page_failed(failure));
    }

    fn on_page_skipped(&self, record: &UrlRecord, reason: SkipReason) {
        self.sinks
            .iter()
            .for_each(|s| s.on_page_skipped(record, reason));
    }

    fn on_progress(&self, completed: usize, queued: usize) {
        self.sinks
            .iter()
            .for_each(|s| s.on_progress(completed, queued));
    }

    fn on_crawl_complete(&self) {
        self.sinks.iter().for_each(|s| s.on_crawl_complete());
    }

    fn on_crawl_aborted(&self) {
        self.sinks.iter().for_each(|s| s.on_crawl_aborted());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FailureKind;
    use chrono::Utc;
    use std::time::Duration;
    use url::Url;

    fn record(path: &str) -> UrlRecord {
        UrlRecord::seed(Url::parse(&format!("https://example.com{}", path)).unwrap())
    }

    fn page(path: &str) -> PageResult {
        let record = record(path);
        PageResult {
            final_url: record.url.clone(),
            record,
            status: 200,
            content_type: Some("text/html".to_string()),
            body: b"<html></html>".to_vec(),
            title: None,
            metadata: None,
            links: vec![],
            attempts: 1,
            elapsed: Duration::from_millis(5),
            fetched_at: Utc::now(),
            parse_error: None,
        }
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.on_page_fetched(&page("/a"));
        sink.on_page_failed(&PageFailure::new(record("/b"), FailureKind::Timeout, 3));
        sink.on_page_skipped(&record("/c"), SkipReason::RobotsDisallowed);
        sink.on_crawl_complete();

        assert_eq!(sink.pages().len(), 1);
        assert_eq!(sink.failures()[0].attempts, 3);
        assert_eq!(sink.skipped()[0].1, SkipReason::RobotsDisallowed);
        assert_eq!(sink.completed_count(), 1);
        assert_eq!(sink.aborted_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_page_fetched(&page("/a"));
        sink.on_progress(1, 4);
        sink.on_crawl_aborted();

        assert!(matches!(rx.recv().await, Some(CrawlEvent::PageFetched(p)) if p.url().path() == "/a"));
        assert!(matches!(
            rx.recv().await,
            Some(CrawlEvent::Progress {
                completed: 1,
                queued: 4
            })
        ));
        let last = rx.recv().await.unwrap();
        assert!(last.is_terminal());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_crawl_complete();
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new()
            .with(first.clone())
            .with(second.clone());
        assert_eq!(fanout.len(), 2);

        fanout.on_page_fetched(&page("/x"));
        fanout.on_crawl_aborted();

        for sink in [&first, &second] {
            assert_eq!(sink.pages().len(), 1);
            assert_eq!(sink.aborted_count(), 1);
        }
    }
}
