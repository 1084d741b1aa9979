use crate::config::types::{
    Config, CrawlConfig, DomainScope, FetchConfig, FilterConfig, RateLimitConfig, RobotsConfig,
};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

/// Upper bound on the worker pool size
const MAX_CONCURRENCY: usize = 256;

/// Validates the entire configuration
///
/// Runs once at session start; a configuration that passes here is treated as
/// immutable, trusted state for the rest of the crawl.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_fetch_config(&config.fetch)?;
    validate_robots_config(&config.robots)?;
    validate_filter_config(&config.filters)?;
    validate_rate_limit_config(&config.rate_limit)?;

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the seed URL and the traversal limits
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let seed = Url::parse(&config.seed_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", config.seed_url, e))
    })?;

    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            config.seed_url
        )));
    }

    if seed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            config.seed_url
        )));
    }

    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry policy, headers, cookies and proxies
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch timeout-ms must be > 0".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    for agent in &config.user_agents {
        HeaderValue::from_str(agent)
            .map_err(|_| ConfigError::InvalidHeader(format!("Invalid user agent '{}'", agent)))?;
    }

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(format!("Invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::InvalidHeader(format!("Invalid value for header '{}'", name))
        })?;
    }

    for (name, value) in &config.cookies {
        if name.is_empty() || name.contains(['=', ';', ' ']) || value.contains(';') {
            return Err(ConfigError::InvalidHeader(format!(
                "Invalid cookie '{}'",
                name
            )));
        }
    }

    for proxy in &config.proxies {
        reqwest::Proxy::all(proxy_url(proxy))
            .map_err(|e| ConfigError::InvalidProxy(format!("'{}': {}", proxy, e)))?;
    }

    Ok(())
}

fn validate_robots_config(config: &RobotsConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "robots timeout-ms must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Validates the domain restriction and extension lists
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    match &config.domain {
        DomainScope::Any => {}
        DomainScope::ExactHost { host } | DomainScope::Subdomains { host } => {
            if let Some(host) = host {
                validate_host(host)?;
            }
        }
        DomainScope::Pattern { pattern } => {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        }
    }

    for ext in config
        .allow_extensions
        .iter()
        .chain(config.deny_extensions.iter())
    {
        let trimmed = ext.trim().trim_start_matches('.');
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(ConfigError::Validation(format!(
                "Invalid file extension '{}'",
                ext
            )));
        }
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }
    Ok(())
}

/// Validates a bare host name used by the domain restriction
fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}

/// Expands a bare `host:port` proxy entry to an http URL
pub(crate) fn proxy_url(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::with_seed("https://example.com/")
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_invalid_seed_url() {
        let mut config = valid_config();
        config.crawl.seed_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.crawl.seed_url = "ftp://example.com/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.crawl.concurrency = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = valid_config();
        config.fetch.max_attempts = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = valid_config();
        config
            .fetch
            .headers
            .insert("Bad Header".to_string(), "x".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_invalid_cookie_rejected() {
        let mut config = valid_config();
        config
            .fetch
            .cookies
            .insert("a=b".to_string(), "c".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_bad_regex_rejected() {
        let mut config = valid_config();
        config.filters.domain = DomainScope::Pattern {
            pattern: "(unclosed".to_string(),
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_delay_bounds_checked() {
        let mut config = valid_config();
        config.rate_limit.min_delay_ms = 500;
        config.rate_limit.max_delay_ms = 100;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_host() {
        assert!(validate_host("example.com").is_ok());
        assert!(validate_host("localhost").is_ok());
        assert!(validate_host("127.0.0.1").is_ok());

        assert!(validate_host("").is_err());
        assert!(validate_host(".example.com").is_err());
        assert!(validate_host("example..com").is_err());
        assert!(validate_host("exa mple.com").is_err());
    }

    #[test]
    fn test_proxy_url() {
        assert_eq!(proxy_url("127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(proxy_url("socks5://proxy:1080"), "socks5://proxy:1080");
    }
}
