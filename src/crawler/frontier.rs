//! Crawl frontier
//!
//! A deduplicating, depth-aware FIFO work queue. The visited set, the queue
//! and the in-flight counter live under one lock so that "queue empty and
//! nothing in flight" is observed atomically: that is the only condition
//! under which the crawl may complete.

use crate::url::{extract_domain, LinkFilter};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

/// A URL admitted into the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// Normalized absolute URL
    pub url: Url,

    /// Link hops from the seed (seed = 0)
    pub depth: u32,

    /// Lower-cased host
    pub domain: String,

    pub discovered_at: DateTime<Utc>,

    /// Page the URL was discovered on (`None` for the seed)
    pub parent: Option<Url>,
}

impl UrlRecord {
    pub fn new(url: Url, depth: u32, parent: Option<Url>) -> Self {
        let domain = extract_domain(&url).unwrap_or_default();
        Self {
            url,
            depth,
            domain,
            discovered_at: Utc::now(),
            parent,
        }
    }

    /// Record for the crawl's starting point
    pub fn seed(url: Url) -> Self {
        Self::new(url, 0, None)
    }

    /// Record for a link discovered on this page
    pub fn child(&self, url: Url) -> Self {
        Self::new(url, self.depth + 1, Some(self.url.clone()))
    }
}

/// Result of a dequeue attempt
#[derive(Debug)]
pub enum Dequeued<'a> {
    /// Work to do; the URL counts as in flight until the guard is dropped
    Url(InFlight<'a>),

    /// Queue empty and nothing in flight: the crawl is complete
    Drained,

    /// The frontier was closed (crawl aborted)
    Closed,
}

/// In-flight slot for one dispatched URL
///
/// Dropping the guard releases the slot, including when the owning task is
/// cancelled. Children must be enqueued before the guard is dropped.
#[derive(Debug)]
pub struct InFlight<'a> {
    frontier: &'a Frontier,
    record: UrlRecord,
}

impl InFlight<'_> {
    pub fn record(&self) -> &UrlRecord {
        &self.record
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.frontier.release();
    }
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<UrlRecord>,
    visited: HashSet<String>,
    in_flight: usize,
    closed: bool,
}

/// Shared crawl queue
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
    max_depth: u32,
    max_pages: Option<usize>,
    filter: LinkFilter,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Deepest admissible depth (inclusive)
    /// * `max_pages` - Maximum number of URLs ever admitted, unbounded if `None`
    /// * `filter` - Policy applied to discovered (non-seed) URLs
    pub fn new(max_depth: u32, max_pages: Option<usize>, filter: LinkFilter) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            notify: Notify::new(),
            max_depth,
            max_pages,
            filter,
        }
    }

    pub fn filter(&self) -> &LinkFilter {
        &self.filter
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admits a discovered URL
    ///
    /// Returns false, without inserting, when the URL was already admitted,
    /// is deeper than the depth limit, fails the link filter, the page budget
    /// is spent, or the frontier is closed.
    pub fn enqueue(&self, record: UrlRecord) -> bool {
        if record.depth > self.max_depth || !self.filter.allows(&record.url) {
            return false;
        }
        self.admit(record)
    }

    /// Admits the seed, subject only to deduplication
    pub fn enqueue_seed(&self, record: UrlRecord) -> bool {
        self.admit(record)
    }

    fn admit(&self, record: UrlRecord) -> bool {
        {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }
            if let Some(max) = self.max_pages {
                if inner.visited.len() >= max {
                    return false;
                }
            }
            // Check and insert in one step
            if !inner.visited.insert(record.url.as_str().to_string()) {
                return false;
            }
            inner.queue.push_back(record);
        }
        self.notify.notify_waiters();
        true
    }

    /// Takes the next URL, waiting while the queue is empty but work is in flight
    pub async fn dequeue(&self) -> Dequeued<'_> {
        loop {
            // Registered before the state check so no wakeup is lost
            let notified = self.notify.notified();
            {
                let mut inner = self.lock();
                if inner.closed {
                    return Dequeued::Closed;
                }
                if let Some(record) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Dequeued::Url(InFlight {
                        frontier: self,
                        record,
                    });
                }
                if inner.in_flight == 0 {
                    return Dequeued::Drained;
                }
            }
            notified.await;
        }
    }

    fn release(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Stops all further enqueues and dequeues
    ///
    /// Pending entries stay in the queue for inspection.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of queued (not yet dispatched) URLs
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Snapshot of the queued URLs in dispatch order
    pub fn pending_urls(&self) -> Vec<UrlRecord> {
        self.lock().queue.iter().cloned().collect()
    }

    /// Number of URLs ever admitted
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.lock().visited.contains(url.as_str())
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::DomainRestriction;
    use std::sync::Arc;
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn frontier(max_depth: u32) -> Frontier {
        Frontier::new(max_depth, None, LinkFilter::allow_all())
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let frontier = frontier(3);
        let seed = UrlRecord::seed(url("https://example.com/"));

        assert!(frontier.enqueue_seed(seed.clone()));
        assert!(!frontier.enqueue_seed(seed.clone()));
        assert!(!frontier.enqueue(seed.child(url("https://example.com/"))));
        assert_eq!(frontier.pending(), 1);
        assert_eq!(frontier.visited_count(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let frontier = frontier(1);
        let seed = UrlRecord::seed(url("https://example.com/"));
        let child = seed.child(url("https://example.com/a"));
        let grandchild = child.child(url("https://example.com/b"));

        assert_eq!(child.depth, 1);
        assert_eq!(grandchild.depth, 2);
        assert!(frontier.enqueue(child));
        assert!(!frontier.enqueue(grandchild));
        assert!(!frontier.is_visited(&url("https://example.com/b")));
    }

    #[test]
    fn test_filter_applies_to_links_not_seed() {
        let frontier = Frontier::new(
            3,
            None,
            LinkFilter::new(DomainRestriction::ExactHost("example.com".to_string())),
        );
        let seed = UrlRecord::seed(url("https://other.org/"));

        assert!(frontier.enqueue_seed(seed.clone()));
        assert!(!frontier.enqueue(seed.child(url("https://other.org/a"))));
        assert!(frontier.enqueue(seed.child(url("https://example.com/a"))));
    }

    #[test]
    fn test_page_budget() {
        let frontier = Frontier::new(3, Some(2), LinkFilter::allow_all());
        let seed = UrlRecord::seed(url("https://example.com/"));

        assert!(frontier.enqueue_seed(seed.clone()));
        assert!(frontier.enqueue(seed.child(url("https://example.com/a"))));
        assert!(!frontier.enqueue(seed.child(url("https://example.com/b"))));
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let frontier = frontier(3);
        let seed = UrlRecord::seed(url("https://example.com/"));
        frontier.enqueue_seed(seed.clone());
        frontier.enqueue(seed.child(url("https://example.com/1")));
        frontier.enqueue(seed.child(url("https://example.com/2")));

        let mut order = Vec::new();
        while let Dequeued::Url(slot) = frontier.dequeue().await {
            order.push(slot.record().url.path().to_string());
        }
        assert_eq!(order, vec!["/", "/1", "/2"]);
    }

    #[tokio::test]
    async fn test_drained_only_when_nothing_in_flight() {
        let frontier = Arc::new(frontier(3));
        frontier.enqueue_seed(UrlRecord::seed(url("https://example.com/")));

        let first = frontier.dequeue().await;
        let Dequeued::Url(slot) = first else {
            panic!("expected a URL");
        };
        assert_eq!(frontier.in_flight(), 1);

        // A second worker must wait, not report completion
        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move {
                match frontier.dequeue().await {
                    Dequeued::Url(slot) => Some(slot.record().url.to_string()),
                    Dequeued::Drained => None,
                    Dequeued::Closed => panic!("unexpected close"),
                }
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        // Child enqueued before the parent's slot is released
        assert!(frontier.enqueue(slot.record().child(url("https://example.com/next"))));
        drop(slot);

        let got = waiter.await.unwrap();
        assert_eq!(got.as_deref(), Some("https://example.com/next"));
        assert!(matches!(frontier.dequeue().await, Dequeued::Drained));
    }

    #[tokio::test]
    async fn test_release_wakes_waiters_into_drained() {
        let frontier = Arc::new(frontier(3));
        frontier.enqueue_seed(UrlRecord::seed(url("https://example.com/")));
        let Dequeued::Url(slot) = frontier.dequeue().await else {
            panic!("expected a URL");
        };

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { matches!(frontier.dequeue().await, Dequeued::Drained) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(slot);

        assert!(waiter.await.unwrap());
        assert_eq!(frontier.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_close_keeps_pending_inspectable() {
        let frontier = frontier(3);
        let seed = UrlRecord::seed(url("https://example.com/"));
        frontier.enqueue_seed(seed.clone());
        frontier.enqueue(seed.child(url("https://example.com/a")));

        frontier.close();

        assert!(matches!(frontier.dequeue().await, Dequeued::Closed));
        assert!(!frontier.enqueue(seed.child(url("https://example.com/b"))));
        assert_eq!(frontier.pending(), 2);
        assert_eq!(frontier.pending_urls()[1].url.path(), "/a");
        assert_eq!(frontier.visited_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_task_releases_slot() {
        let frontier = Arc::new(frontier(3));
        frontier.enqueue_seed(UrlRecord::seed(url("https://example.com/")));

        let task = {
            let frontier = frontier.clone();
            tokio::spawn(async move {
                let _slot = frontier.dequeue().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(frontier.in_flight(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(frontier.in_flight(), 0);
    }
}
