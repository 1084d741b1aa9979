//! Robots.txt caching implementation
//!
//! Entries live for the whole crawl session unless a TTL is configured.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Cached robots.txt rules for one origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub rules: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots instance stamped with the current time
    pub fn new(rules: ParsedRobots) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the entry is older than `ttl`
    ///
    /// Without a TTL an entry never goes stale.
    pub fn is_stale(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.age().to_std().map_or(false, |age| age > ttl),
            None => false,
        }
    }

    /// Returns the age of the cached robots.txt
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }
}
