//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building HTTP clients (one per configured proxy)
//! - Per-request user agent, headers and cookies
//! - Proxy rotation per request or per domain
//! - Retry with exponential backoff for transient failures
//! - Failure classification

use crate::config::{proxy_url, FetchConfig, ProxyRotation};
use crate::state::FailureKind;
use crate::{ConfigError, SpiderError};
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE, USER_AGENT};
use reqwest::{redirect::Policy, Client, Proxy};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Accept header sent unless one is configured
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Browser identities used when user agent randomization is on and no pool is configured
const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Wall time across all attempts and backoff sleeps
    pub elapsed: Duration,
}

impl FetchedPage {
    /// Returns true if the body should be parsed as HTML
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => true,
        }
    }
}

/// Final result of fetching one URL
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(FetchedPage),
    Failure { kind: FailureKind, attempts: u32 },
}

impl FetchOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success(page) => page.attempts,
            Self::Failure { attempts, .. } => *attempts,
        }
    }
}

/// Retrying HTTP fetcher
///
/// Configuration is validated once at construction; fetching never fails
/// with an error, only with a classified `FetchOutcome::Failure`.
#[derive(Debug)]
pub struct Fetcher {
    clients: Vec<Client>,
    config: FetchConfig,
    cookie_header: Option<HeaderValue>,
    /// Host the configured cookies belong to
    cookie_host: Option<String>,
    next_proxy: AtomicUsize,
}

impl Fetcher {
    /// Builds a fetcher from the fetch configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Fetch behaviour
    /// * `seed` - Crawl seed; persisted cookies are scoped to its host
    pub fn new(config: &FetchConfig, seed: &Url) -> Result<Self, SpiderError> {
        let headers = build_default_headers(config)?;

        let (jar, cookie_header) = if config.cookies.is_empty() {
            (None, None)
        } else if config.persist_cookies {
            let jar = Arc::new(Jar::default());
            for (name, value) in &config.cookies {
                jar.add_cookie_str(&format!("{}={}", name, value), seed);
            }
            (Some(jar), None)
        } else {
            let joined = config
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::from_str(&joined)
                .map_err(|_| ConfigError::InvalidHeader("Invalid cookie value".to_string()))?;
            (None, Some(value))
        };

        let clients = if config.proxies.is_empty() {
            vec![build_http_client(config, &headers, None, jar.clone())?]
        } else {
            config
                .proxies
                .iter()
                .map(|proxy| build_http_client(config, &headers, Some(proxy), jar.clone()))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            clients,
            config: config.clone(),
            cookie_header,
            cookie_host: seed.host_str().map(str::to_lowercase),
            next_proxy: AtomicUsize::new(0),
        })
    }

    /// User agent the crawler identifies as (used for robots.txt matching)
    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Success |
    /// | Connection / DNS / TLS error | Retry → `network-error` |
    /// | Timeout | Retry → `timeout` |
    /// | HTTP 5xx | Retry → `http-error(status)` |
    /// | HTTP 429 | Retry only with `retry-on-429`, else immediate |
    /// | Other 4xx / 3xx | Immediate → `http-error(status)` |
    ///
    /// At most `max-attempts` requests are sent in total, with a backoff of
    /// `backoff-base-ms * 2^(attempt-1)` (plus optional jitter) between them.
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let kind = match self.attempt(url, attempt).await {
                Ok((final_url, status, content_type, body)) => {
                    return FetchOutcome::Success(FetchedPage {
                        final_url,
                        status,
                        content_type,
                        body,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
                Err(kind) => kind,
            };

            if attempt >= max_attempts || !kind.is_retryable(self.config.retry_on_429) {
                return FetchOutcome::Failure {
                    kind,
                    attempts: attempt,
                };
            }

            let delay = self.backoff_delay(attempt);
            debug!(
                "Retrying {} in {}ms after {} (attempt {}/{})",
                url,
                delay.as_millis(),
                kind,
                attempt,
                max_attempts
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Sends one request and classifies its result
    async fn attempt(
        &self,
        url: &Url,
        attempt: u32,
    ) -> Result<(Url, u16, Option<String>, Vec<u8>), FailureKind> {
        let started = Instant::now();
        let mut request = self
            .client_for(url)
            .get(url.clone())
            .header(USER_AGENT, self.pick_user_agent())
            .timeout(Duration::from_millis(self.config.timeout_ms));
        if let Some(cookies) = self.cookies_for(url) {
            request = request.header(COOKIE, cookies.clone());
        }

        let result = request.send().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_error(&e);
                debug!(
                    method = "GET",
                    url = %url,
                    error = %e,
                    elapsed_ms,
                    attempt,
                    "fetch attempt failed"
                );
                return Err(kind);
            }
        };

        let status = response.status();
        debug!(
            method = "GET",
            url = %url,
            status = status.as_u16(),
            elapsed_ms,
            attempt,
            "fetch attempt"
        );

        if !status.is_success() {
            return Err(FailureKind::HttpError {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| classify_error(&e))?;

        Ok((final_url, status.as_u16(), content_type, body.to_vec()))
    }

    /// Configured cookies, only for requests to the seed host
    fn cookies_for(&self, url: &Url) -> Option<&HeaderValue> {
        let cookies = self.cookie_header.as_ref()?;
        let host = url.host_str()?;
        let seed_host = self.cookie_host.as_deref()?;
        host.eq_ignore_ascii_case(seed_host).then_some(cookies)
    }

    fn client_for(&self, url: &Url) -> &Client {
        let n = self.clients.len();
        let index = if n <= 1 {
            0
        } else {
            match self.config.proxy_rotation {
                ProxyRotation::PerRequest => self.next_proxy.fetch_add(1, Ordering::Relaxed) % n,
                ProxyRotation::PerDomain => {
                    let mut hasher = DefaultHasher::new();
                    url.host_str().unwrap_or("").hash(&mut hasher);
                    (hasher.finish() % n as u64) as usize
                }
            }
        };
        &self.clients[index]
    }

    fn pick_user_agent(&self) -> &str {
        let mut rng = rand::rng();
        if !self.config.user_agents.is_empty() {
            if let Some(agent) = self.config.user_agents.choose(&mut rng) {
                return agent;
            }
        }
        if self.config.randomize_user_agent {
            if let Some(agent) = BROWSER_USER_AGENTS.choose(&mut rng) {
                return agent;
            }
        }
        &self.config.user_agent
    }

    /// Delay before attempt `attempt + 1`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let step = self.config.backoff_base_ms.saturating_mul(1u64 << exponent);
        let jitter = if self.config.backoff_jitter && step > 0 {
            rand::rng().random_range(0..=step)
        } else {
            0
        };
        Duration::from_millis(step.saturating_add(jitter))
    }
}

/// Builds an HTTP client with the crawl's transport settings
///
/// # Arguments
///
/// * `config` - Fetch configuration (timeouts, default user agent)
/// * `headers` - Headers sent with every request
/// * `proxy` - Optional proxy; a bare `host:port` is read as http
/// * `jar` - Shared cookie jar when cookies persist across requests
pub fn build_http_client(
    config: &FetchConfig,
    headers: &HeaderMap,
    proxy: Option<&str>,
    jar: Option<Arc<Jar>>,
) -> Result<Client, SpiderError> {
    let timeout = Duration::from_millis(config.timeout_ms);

    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers.clone())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        let proxy = Proxy::all(proxy_url(proxy))
            .map_err(|e| ConfigError::InvalidProxy(format!("'{}': {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }

    Ok(builder.build()?)
}

/// Headers sent with every request: the default `Accept` plus configured headers
pub fn build_default_headers(config: &FetchConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(format!("Invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::InvalidHeader(format!("Invalid value for header '{}'", name)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn classify_error(e: &reqwest::Error) -> FailureKind {
    if e.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::NetworkError {
            message: e.to_string(),
        }
    }
}
