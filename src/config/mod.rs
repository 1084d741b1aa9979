//! Configuration module for Spider-Scraper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section except `[crawl]` is optional and falls back to documented defaults.
//!
//! # Example
//!
//! ```no_run
//! use spider_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("spider.toml")).unwrap();
//! println!("Crawling {} to depth {}", config.crawl.seed_url, config.crawl.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, DomainScope, ExtractConfig, FetchConfig, FilterConfig, OutputConfig,
    ProxyRotation, RateLimitConfig, RobotsConfig, RobotsFailurePolicy, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
pub(crate) use validation::proxy_url;
