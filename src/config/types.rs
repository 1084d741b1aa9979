use serde::Deserialize;
use std::collections::BTreeMap;

/// Default crawler identity sent when no user agent is configured
pub const DEFAULT_USER_AGENT: &str = "SpiderScraper/1.0 (+https://github.com/spider-scraper)";

/// Main configuration structure for Spider-Scraper
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds a configuration with every option at its default value
    ///
    /// # Example
    ///
    /// ```
    /// use spider_scraper::config::Config;
    ///
    /// let config = Config::with_seed("https://example.com/");
    /// assert_eq!(config.crawl.max_depth, 3);
    /// assert!(config.robots.respect);
    /// ```
    pub fn with_seed(seed_url: &str) -> Self {
        Self {
            crawl: CrawlConfig::with_seed(seed_url),
            fetch: FetchConfig::default(),
            robots: RobotsConfig::default(),
            filters: FilterConfig::default(),
            rate_limit: RateLimitConfig::default(),
            extract: ExtractConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Crawl traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// URL the crawl starts from (depth 0)
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Maximum number of link hops from the seed
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of URLs admitted into the frontier (unbounded if absent)
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<usize>,

    /// Number of concurrent fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// How long in-flight fetches may run after an abort request (milliseconds)
    #[serde(rename = "abort-grace-ms", default = "default_abort_grace_ms")]
    pub abort_grace_ms: u64,

    /// Overall crawl duration cap (seconds); the crawl is aborted when reached
    #[serde(rename = "max-duration-secs", default)]
    pub max_duration_secs: Option<u64>,
}

impl CrawlConfig {
    pub fn with_seed(seed_url: &str) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            max_depth: default_max_depth(),
            max_pages: None,
            concurrency: default_concurrency(),
            abort_grace_ms: default_abort_grace_ms(),
            max_duration_secs: None,
        }
    }
}

fn default_max_depth() -> u32 {
    3
}

fn default_concurrency() -> usize {
    4
}

fn default_abort_grace_ms() -> u64 {
    5000
}

/// How proxies from the configured list are assigned to requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyRotation {
    /// Round robin, one step per request
    #[default]
    PerRequest,
    /// Every request to the same host goes through the same proxy
    PerDomain,
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Per-attempt request timeout (milliseconds)
    pub timeout_ms: u64,

    /// Total number of attempts for a URL, including the first one
    pub max_attempts: u32,

    /// Base delay of the exponential backoff between attempts (milliseconds)
    pub backoff_base_ms: u64,

    /// Add a random jitter of up to one backoff step
    pub backoff_jitter: bool,

    /// Treat HTTP 429 as retryable instead of failing immediately
    pub retry_on_429: bool,

    /// Crawler identity, also used to match robots.txt groups
    pub user_agent: String,

    /// Pool of user agents picked at random per request
    pub user_agents: Vec<String>,

    /// Pick a random user agent per request (built-in browser list when `user-agents` is empty)
    pub randomize_user_agent: bool,

    /// Extra request headers
    pub headers: BTreeMap<String, String>,

    /// Cookies sent with every request
    pub cookies: BTreeMap<String, String>,

    /// Keep a session cookie jar (seeded with `cookies`) across requests
    pub persist_cookies: bool,

    /// Proxy URLs (`http://host:port`; a bare `host:port` is read as http)
    pub proxies: Vec<String>,

    pub proxy_rotation: ProxyRotation,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 12_000,
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_jitter: true,
            retry_on_429: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            user_agents: Vec::new(),
            randomize_user_agent: false,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            persist_cookies: false,
            proxies: Vec::new(),
            proxy_rotation: ProxyRotation::PerRequest,
        }
    }
}

/// Decision used when robots.txt cannot be fetched or understood
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RobotsFailurePolicy {
    #[default]
    Allow,
    Deny,
}

/// robots.txt handling
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RobotsConfig {
    /// Honour robots.txt rules at all
    pub respect: bool,

    pub on_error: RobotsFailurePolicy,

    /// Timeout of the robots.txt request (milliseconds)
    pub timeout_ms: u64,

    /// Refetch robots.txt after this many seconds (cached for the whole crawl if absent)
    pub cache_ttl_secs: Option<u64>,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            respect: true,
            on_error: RobotsFailurePolicy::Allow,
            timeout_ms: 5000,
            cache_ttl_secs: None,
        }
    }
}

/// Which hosts discovered links may point at
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum DomainScope {
    /// No restriction
    Any,
    /// Only the given host (the seed's host when omitted)
    ExactHost {
        #[serde(default)]
        host: Option<String>,
    },
    /// The given host and all of its subdomains (the seed's host when omitted)
    Subdomains {
        #[serde(default)]
        host: Option<String>,
    },
    /// Hosts matching a regular expression
    Pattern { pattern: String },
}

impl Default for DomainScope {
    fn default() -> Self {
        Self::ExactHost { host: None }
    }
}

/// Link filtering rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    pub domain: DomainScope,

    /// If non-empty, only paths ending in one of these extensions are followed
    pub allow_extensions: Vec<String>,

    /// Paths ending in one of these extensions are never followed
    pub deny_extensions: Vec<String>,

    /// If non-empty, the URL must contain at least one of these (case-insensitive)
    pub include_keywords: Vec<String>,

    /// URLs containing any of these are dropped (case-insensitive)
    pub exclude_keywords: Vec<String>,
}

/// Politeness delay applied before each fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 300,
            max_delay_ms: 300,
        }
    }
}

/// Optional content extraction performed on every HTML page
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractConfig {
    /// Meta tags, Open Graph / Twitter cards and canonical link
    pub metadata: bool,

    /// HTML tables
    pub tables: bool,

    /// JSON-LD, JSON script bodies and JSON attributes
    pub json: bool,

    /// Stylesheet links, `<style>` blocks and inline `style` attributes
    pub css: bool,

    /// External script URLs, inline scripts and `on*` handler attributes
    pub scripts: bool,

    /// Image URLs; images are listed, never downloaded
    pub images: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            metadata: true,
            tables: false,
            json: false,
            css: false,
            scripts: false,
            images: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./spider-scraper.db".to_string(),
        }
    }
}
