//! Robots.txt handling module
//!
//! This module provides the robots policy guard: it fetches, parses and
//! caches robots.txt per origin and decides whether a URL may be fetched.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::{product_token, ParsedRobots, MAX_CRAWL_DELAY};

use crate::config::{FetchConfig, RobotsConfig, RobotsFailurePolicy};
use crate::crawler::{build_default_headers, build_http_client};
use crate::url::origin_of;
use crate::SpiderError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

type RobotsSlot = Arc<tokio::sync::Mutex<Option<CachedRobots>>>;

/// Answer of the guard for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotsDecision {
    pub allowed: bool,
    pub crawl_delay: Option<Duration>,
}

impl RobotsDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            crawl_delay: None,
        }
    }
}

/// Gates every fetch on the target origin's robots.txt
///
/// Each origin has its own async slot, so concurrent queries for one origin
/// trigger a single robots.txt request while other origins proceed.
pub struct RobotsGuard {
    client: reqwest::Client,
    config: RobotsConfig,
    slots: Mutex<HashMap<String, RobotsSlot>>,
}

impl RobotsGuard {
    /// Creates a guard with its own HTTP client
    ///
    /// The client shares the crawl's user agent, default headers and first
    /// proxy, so robots.txt is requested the same way as pages.
    pub fn new(config: RobotsConfig, fetch: &FetchConfig) -> Result<Self, SpiderError> {
        let headers = build_default_headers(fetch)?;
        let proxy = fetch.proxies.first().map(String::as_str);
        let client = build_http_client(fetch, &headers, proxy, None)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: RobotsConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `user_agent` may fetch `url`
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        self.check(url, user_agent).await.allowed
    }

    /// `Crawl-delay` that applies to `user_agent` on the URL's origin
    pub async fn crawl_delay(&self, url: &Url, user_agent: &str) -> Option<Duration> {
        self.check(url, user_agent).await.crawl_delay
    }

    /// Evaluates the URL, fetching the origin's robots.txt on first use
    pub async fn check(&self, url: &Url, user_agent: &str) -> RobotsDecision {
        if !self.config.respect {
            return RobotsDecision::allow();
        }

        let Some(origin) = origin_of(url) else {
            return RobotsDecision::allow();
        };

        let rules = self.rules_for(&origin).await;
        let decision = RobotsDecision {
            allowed: rules.is_allowed(url.as_str(), user_agent),
            crawl_delay: rules.crawl_delay(user_agent),
        };

        if !decision.allowed {
            debug!("robots.txt disallows {}", url);
        }
        decision
    }

    /// Number of origins with a robots.txt slot
    pub fn cached_origins(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    async fn rules_for(&self, origin: &str) -> ParsedRobots {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(slots) => slots,
                Err(poisoned) => poisoned.into_inner(),
            };
            slots.entry(origin.to_string()).or_default().clone()
        };

        let mut cached = slot.lock().await;
        let ttl = self.config.cache_ttl_secs.map(Duration::from_secs);

        match cached.as_ref() {
            Some(entry) if !entry.is_stale(ttl) => entry.rules.clone(),
            _ => {
                let rules = self.fetch_rules(origin).await;
                *cached = Some(CachedRobots::new(rules.clone()));
                rules
            }
        }
    }

    async fn fetch_rules(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);
        debug!("Fetching {}", robots_url);

        let response = match self
            .client
            .get(&robots_url)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() { "timed out" } else { "failed" };
                warn!("robots.txt fetch for {} {}: {}", origin, reason, e);
                return self.on_error();
            }
        };

        let status = response.status();
        if status.is_client_error() {
            debug!("No robots.txt for {} (HTTP {}), allowing all", origin, status);
            return ParsedRobots::allow_all();
        }
        if !status.is_success() {
            warn!("robots.txt for {} returned HTTP {}", origin, status);
            return self.on_error();
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read robots.txt body for {}: {}", origin, e);
                return self.on_error();
            }
        };

        match std::str::from_utf8(&bytes) {
            Ok(body) if looks_like_html(body) => {
                warn!("robots.txt for {} is an HTML document", origin);
                self.on_error()
            }
            Ok(body) => ParsedRobots::from_content(body),
            Err(_) => {
                warn!("robots.txt for {} is not valid UTF-8", origin);
                self.on_error()
            }
        }
    }

    fn on_error(&self) -> ParsedRobots {
        match self.config.on_error {
            RobotsFailurePolicy::Allow => ParsedRobots::allow_all(),
            RobotsFailurePolicy::Deny => ParsedRobots::deny_all(),
        }
    }
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(15)
        .collect::<String>()
        .to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}
