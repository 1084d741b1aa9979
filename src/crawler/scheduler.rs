//! Crawl scheduler: a bounded worker pool over the frontier
//!
//! This module handles:
//! - Running `crawl.concurrency` worker tasks that drain the frontier
//! - Pause, resume and abort through a cloneable `CrawlHandle`
//! - Politeness delays (random in the configured range, at least the
//!   robots.txt `Crawl-delay`)
//! - The abort grace period and the optional overall duration cap
//!
//! Each worker repeats: pause checkpoint, dequeue, abort check, robots
//! check, delay, abort check, fetch, parse on the blocking pool, enqueue
//! children, emit, progress.

use crate::config::{ExtractConfig, RateLimitConfig};
use crate::crawler::fetcher::{FetchOutcome, FetchedPage, Fetcher};
use crate::crawler::frontier::{Dequeued, Frontier, InFlight, UrlRecord};
use crate::crawler::parser::{parse_page, ParsedPage};
use crate::output::{PageFailure, PageResult, ResultSink};
use crate::robots::RobotsGuard;
use crate::state::{CrawlState, SkipReason};
use crate::SpiderError;
use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Pages between two progress log lines
const PROGRESS_LOG_INTERVAL: usize = 10;

/// Controls a running crawl from any task
///
/// Cloning is cheap; every clone drives the same crawl.
#[derive(Debug, Clone)]
pub struct CrawlHandle {
    state: Arc<watch::Sender<CrawlState>>,
    frontier: Arc<Frontier>,
}

impl CrawlHandle {
    pub(crate) fn new(frontier: Arc<Frontier>) -> Self {
        let (tx, _rx) = watch::channel(CrawlState::Idle);
        Self {
            state: Arc::new(tx),
            frontier,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> CrawlState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<CrawlState> {
        self.state.subscribe()
    }

    /// Holds workers at their next checkpoint
    pub fn pause(&self) -> Result<(), SpiderError> {
        self.transition(CrawlState::Paused, |_| true)?;
        info!("Crawl paused");
        Ok(())
    }

    /// Releases paused workers
    pub fn resume(&self) -> Result<(), SpiderError> {
        self.transition(CrawlState::Running, |current| current == CrawlState::Paused)?;
        info!("Crawl resumed");
        Ok(())
    }

    /// Stops the crawl
    ///
    /// The state becomes `Aborted` immediately and the frontier is closed.
    /// Fetches already in progress get the abort grace period.
    pub fn abort(&self) -> Result<(), SpiderError> {
        self.transition(CrawlState::Aborted, |_| true)?;
        self.frontier.close();
        info!("Crawl aborted");
        Ok(())
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == CrawlState::Aborted
    }

    /// Applies `current -> next` if legal and accepted by `extra`
    pub(crate) fn transition(
        &self,
        next: CrawlState,
        extra: impl Fn(CrawlState) -> bool,
    ) -> Result<(), SpiderError> {
        let mut result = Ok(());
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) && extra(*current) {
                *current = next;
                true
            } else {
                result = Err(SpiderError::InvalidTransition {
                    from: *current,
                    to: next,
                });
                false
            }
        });
        result
    }
}

/// Politeness delay before a fetch
///
/// Uniform in `[min-delay-ms, max-delay-ms]`, raised to the robots.txt
/// `Crawl-delay` when that is longer.
pub fn politeness_delay(rate_limit: &RateLimitConfig, crawl_delay: Option<Duration>) -> Duration {
    let min = rate_limit.min_delay_ms.min(rate_limit.max_delay_ms);
    let max = rate_limit.max_delay_ms.max(min);
    let base = if min == max {
        min
    } else {
        rand::rng().random_range(min..=max)
    };
    let base = Duration::from_millis(base);
    crawl_delay.map_or(base, |robots| base.max(robots))
}

/// Shared state of all workers
struct WorkerContext {
    frontier: Arc<Frontier>,
    robots: Arc<RobotsGuard>,
    fetcher: Arc<Fetcher>,
    sink: Arc<dyn ResultSink>,
    handle: CrawlHandle,
    extract: ExtractConfig,
    rate_limit: RateLimitConfig,
    completed: AtomicUsize,
    started: Instant,
}

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub concurrency: usize,
    pub abort_grace: Duration,
    pub max_duration: Option<Duration>,
    pub extract: ExtractConfig,
    pub rate_limit: RateLimitConfig,
}

/// Runs the worker pool for one crawl
pub struct Scheduler {
    ctx: Arc<WorkerContext>,
    concurrency: usize,
    abort_grace: Duration,
    max_duration: Option<Duration>,
}

impl Scheduler {
    pub fn new(
        frontier: Arc<Frontier>,
        robots: Arc<RobotsGuard>,
        fetcher: Arc<Fetcher>,
        sink: Arc<dyn ResultSink>,
        handle: CrawlHandle,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerContext {
                frontier,
                robots,
                fetcher,
                sink,
                handle,
                extract: options.extract,
                rate_limit: options.rate_limit,
                completed: AtomicUsize::new(0),
                started: Instant::now(),
            }),
            concurrency: options.concurrency.max(1),
            abort_grace: options.abort_grace,
            max_duration: options.max_duration,
        }
    }

    /// Runs workers until the frontier drains or the crawl is aborted
    ///
    /// The state must already be `Running`. Fires exactly one of
    /// `on_crawl_complete` / `on_crawl_aborted` and returns the final state.
    pub async fn run(self) -> CrawlState {
        let handle = self.ctx.handle.clone();
        let mut state_rx = handle.subscribe();

        let mut workers = JoinSet::new();
        for id in 0..self.concurrency {
            workers.spawn(worker_loop(id, self.ctx.clone()));
        }
        debug!("Started {} workers", self.concurrency);

        let mut deadline = self
            .max_duration
            .map(|d| tokio::time::Instant::now() + d);
        let mut aborted = false;
        let mut panicked = 0usize;

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Err(e)) if e.is_panic() => {
                        panicked += 1;
                        error!("Crawl worker panicked: {}", e);
                    }
                    Some(_) => {}
                    None => break,
                },
                _ = wait_for_abort(&mut state_rx) => {
                    aborted = true;
                    break;
                }
                _ = sleep_until(deadline) => {
                    deadline = None;
                    info!("Maximum crawl duration reached, aborting");
                    if let Err(e) = handle.abort() {
                        debug!("Duration cap ignored: {}", e);
                    }
                }
            }
        }

        if aborted {
            drain_with_grace(&mut workers, self.abort_grace).await;
        }

        let final_state = self.settle(aborted, panicked).await;

        info!(
            "Crawl {}: {} pages in {:.1}s",
            final_state,
            self.ctx.completed.load(Ordering::SeqCst),
            self.ctx.started.elapsed().as_secs_f64()
        );
        final_state
    }

    /// Decides the final state once no worker is left and fires the matching sink event
    ///
    /// A crawl whose workers drained while paused waits for `resume` or
    /// `abort`. Work lost to panicked workers ends the crawl as aborted.
    async fn settle(&self, aborted: bool, panicked: usize) -> CrawlState {
        let handle = &self.ctx.handle;
        let frontier = &self.ctx.frontier;

        if !aborted && panicked > 0 {
            let resolved = self.ctx.completed.load(Ordering::SeqCst);
            let unresolved = frontier.visited_count().saturating_sub(resolved);
            if unresolved > 0 || frontier.pending() > 0 {
                error!(
                    "{} workers panicked, {} URLs left unresolved; aborting crawl",
                    panicked, unresolved
                );
                if let Err(e) = handle.abort() {
                    debug!("Abort after worker panic ignored: {}", e);
                }
            }
        }

        if !aborted && handle.state() == CrawlState::Paused {
            info!("Frontier drained while paused; waiting for resume or abort");
            let mut state_rx = handle.subscribe();
            if state_rx
                .wait_for(|s| *s != CrawlState::Paused)
                .await
                .is_err()
            {
                warn!("Crawl handle closed while paused");
            }
        }

        if aborted || handle.is_aborted() {
            self.ctx.sink.on_crawl_aborted();
            return CrawlState::Aborted;
        }

        match handle.transition(CrawlState::Completed, |_| true) {
            Ok(()) => {
                self.ctx.sink.on_crawl_complete();
                CrawlState::Completed
            }
            Err(e) => {
                // Lost a race with abort after the checks above
                debug!("Completion lost to {}", e);
                self.ctx.sink.on_crawl_aborted();
                CrawlState::Aborted
            }
        }
    }
}

async fn wait_for_abort(rx: &mut watch::Receiver<CrawlState>) {
    let observed = rx.wait_for(|s| *s == CrawlState::Aborted).await.is_ok();
    if !observed {
        std::future::pending::<()>().await;
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Lets in-progress work finish for `grace`, then cancels what is left
async fn drain_with_grace(workers: &mut JoinSet<()>, grace: Duration) {
    let timer = tokio::time::sleep(grace);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            joined = workers.join_next() => {
                if joined.is_none() {
                    return;
                }
            }
            _ = &mut timer => {
                warn!("Cancelling {} workers after abort grace period", workers.len());
                workers.abort_all();
                while workers.join_next().await.is_some() {}
                return;
            }
        }
    }
}

async fn worker_loop(id: usize, ctx: Arc<WorkerContext>) {
    let mut state_rx = ctx.handle.subscribe();

    loop {
        // Pause checkpoint
        let unpaused = state_rx
            .wait_for(|s| *s != CrawlState::Paused)
            .await
            .is_ok();
        if !unpaused || ctx.handle.is_aborted() {
            break;
        }

        let slot = match ctx.frontier.dequeue().await {
            Dequeued::Url(slot) => slot,
            Dequeued::Drained | Dequeued::Closed => break,
        };
        if ctx.handle.is_aborted() {
            break;
        }

        process(&ctx, slot).await;
    }

    debug!("Worker {} finished", id);
}

/// Handles one dispatched URL; the in-flight slot is released on return
async fn process(ctx: &WorkerContext, slot: InFlight<'_>) {
    let record = slot.record().clone();
    let user_agent = ctx.fetcher.user_agent();

    let decision = ctx.robots.check(&record.url, user_agent).await;
    if !decision.allowed {
        ctx.sink
            .on_page_skipped(&record, SkipReason::RobotsDisallowed);
        ctx.page_done();
        return;
    }

    let delay = politeness_delay(&ctx.rate_limit, decision.crawl_delay);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if ctx.handle.is_aborted() {
        return;
    }

    match ctx.fetcher.fetch(&record.url).await {
        FetchOutcome::Success(page) => {
            let (page, parsed) = ctx.parse(&record, page).await;
            for child in &parsed.links {
                ctx.frontier.enqueue(child.clone());
            }
            let result = PageResult {
                final_url: page.final_url,
                status: page.status,
                content_type: page.content_type,
                body: page.body,
                title: parsed.title,
                metadata: parsed.metadata,
                links: parsed.links.into_iter().map(|child| child.url).collect(),
                attempts: page.attempts,
                elapsed: page.elapsed,
                fetched_at: Utc::now(),
                parse_error: parsed.parse_error,
                record,
            };
            debug!(
                "Fetched {} ({}, {} links)",
                result.url(),
                result.status,
                result.links.len()
            );
            ctx.sink.on_page_fetched(&result);
        }
        FetchOutcome::Failure { kind, attempts } => {
            warn!(
                "Giving up on {} after {} attempts: {}",
                record.url, attempts, kind
            );
            ctx.sink
                .on_page_failed(&PageFailure::new(record, kind, attempts));
        }
    }

    ctx.page_done();
    drop(slot);
}

impl WorkerContext {
    /// Parses an HTML body on the blocking pool
    async fn parse(&self, record: &UrlRecord, page: FetchedPage) -> (FetchedPage, ParsedPage) {
        if !page.is_html() {
            return (page, ParsedPage::default());
        }

        let frontier = self.frontier.clone();
        let extract = self.extract.clone();
        let record = record.clone();
        let url = page.final_url.clone();

        let task = tokio::task::spawn_blocking(move || {
            let parsed = parse_page(&page.body, &record, &page.final_url, frontier.filter(), &extract);
            (page, parsed)
        });

        match task.await {
            Ok(done) => done,
            Err(e) => {
                // The page moved into the task; report it without a body
                error!("Parser task for {} failed: {}", url, e);
                let page = FetchedPage {
                    final_url: url,
                    status: 0,
                    content_type: None,
                    body: Vec::new(),
                    attempts: 0,
                    elapsed: Duration::ZERO,
                };
                let parsed = ParsedPage {
                    parse_error: Some(format!("parser task failed: {}", e)),
                    ..ParsedPage::default()
                };
                (page, parsed)
            }
        }
    }

    /// Counts a finished page and reports progress
    fn page_done(&self) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let queued = self.frontier.pending();
        self.sink.on_progress(completed, queued);

        if completed % PROGRESS_LOG_INTERVAL == 0 {
            let rate = completed as f64 / self.started.elapsed().as_secs_f64().max(f64::EPSILON);
            info!(
                "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                completed, queued, rate
            );
        }
    }
}
