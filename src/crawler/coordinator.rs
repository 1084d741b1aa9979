//! Crawler coordinator - one crawl session
//!
//! This module wires a validated configuration into the crawl engine:
//! - Normalizing the seed and building the link filter
//! - Creating the frontier, robots guard and fetcher
//! - Running the scheduler and reporting to a result sink

use crate::config::{validate, Config};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Frontier, UrlRecord};
use crate::crawler::scheduler::{CrawlHandle, Scheduler, SchedulerOptions};
use crate::output::ResultSink;
use crate::robots::RobotsGuard;
use crate::state::CrawlState;
use crate::url::{normalize_url, LinkFilter};
use crate::SpiderError;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Main crawler coordinator structure
///
/// A coordinator runs at most one crawl. Obtain a [`CrawlHandle`] before
/// calling [`Coordinator::run`] to pause, resume or abort it from
/// another task.
pub struct Coordinator {
    config: Arc<Config>,
    seed: Url,
    frontier: Arc<Frontier>,
    robots: Arc<RobotsGuard>,
    fetcher: Arc<Fetcher>,
    handle: CrawlHandle,
}

impl Coordinator {
    /// Creates a new crawl session
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Configuration accepted, nothing fetched yet
    /// * `Err(SpiderError)` - Invalid configuration or HTTP client setup failure
    pub fn new(config: Config) -> Result<Self, SpiderError> {
        validate(&config)?;

        let seed = normalize_url(&config.crawl.seed_url)?;
        let filter = LinkFilter::from_config(&config.filters, &seed)?;
        let frontier = Arc::new(Frontier::new(
            config.crawl.max_depth,
            config.crawl.max_pages,
            filter,
        ));

        let robots = Arc::new(RobotsGuard::new(config.robots.clone(), &config.fetch)?);
        let fetcher = Arc::new(Fetcher::new(&config.fetch, &seed)?);
        let handle = CrawlHandle::new(frontier.clone());

        tracing::debug!(
            "Crawl session for {} (depth {}, concurrency {})",
            seed,
            config.crawl.max_depth,
            config.crawl.concurrency
        );

        Ok(Self {
            config: Arc::new(config),
            seed,
            frontier,
            robots,
            fetcher,
            handle,
        })
    }

    /// The normalized seed URL
    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle controlling this session
    pub fn handle(&self) -> CrawlHandle {
        self.handle.clone()
    }

    /// The session's frontier, for inspection during or after the crawl
    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    pub fn state(&self) -> CrawlState {
        self.handle.state()
    }

    /// Runs the crawl to completion or abort
    ///
    /// Every page outcome goes to `sink`, followed by exactly one
    /// `on_crawl_complete` or `on_crawl_aborted`.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlState)` - `Completed` or `Aborted`
    /// * `Err(SpiderError)` - The session was already started
    pub async fn run(&self, sink: Arc<dyn ResultSink>) -> Result<CrawlState, SpiderError> {
        if self.handle.is_aborted() {
            tracing::info!("Crawl aborted before it started");
            sink.on_crawl_aborted();
            return Ok(CrawlState::Aborted);
        }
        self.handle.transition(CrawlState::Running, |current| {
            current == CrawlState::Idle
        })?;

        tracing::info!("Starting crawl at {}", self.seed);
        self.frontier.enqueue_seed(UrlRecord::seed(self.seed.clone()));

        let crawl = &self.config.crawl;
        let options = SchedulerOptions {
            concurrency: crawl.concurrency,
            abort_grace: Duration::from_millis(crawl.abort_grace_ms),
            max_duration: crawl.max_duration_secs.map(Duration::from_secs),
            extract: self.config.extract.clone(),
            rate_limit: self.config.rate_limit.clone(),
        };

        let scheduler = Scheduler::new(
            self.frontier.clone(),
            self.robots.clone(),
            self.fetcher.clone(),
            sink,
            self.handle.clone(),
            options,
        );
        let final_state = scheduler.run().await;

        tracing::info!(
            "Crawl finished ({}): {} URLs admitted, {} left in frontier, {} robots.txt origins",
            final_state,
            self.frontier.visited_count(),
            self.frontier.pending(),
            self.robots.cached_origins()
        );
        Ok(final_state)
    }
}

/// Runs a complete crawl with a fresh session
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `sink` - Receiver of every page outcome
pub async fn run_crawl(
    config: Config,
    sink: Arc<dyn ResultSink>,
) -> Result<CrawlState, SpiderError> {
    Coordinator::new(config)?.run(sink).await
}
