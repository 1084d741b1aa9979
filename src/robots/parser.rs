//! Robots.txt parser implementation
//!
//! Rule matching is delegated to the robotstxt crate (Google's matcher);
//! `Crawl-delay`, which that matcher ignores, is read here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Longest `Crawl-delay` honoured; larger values are clamped to it
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rules {
    AllowAll,
    DenyAll,
    Parsed(String),
}

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRobots {
    rules: Rules,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }
        Self {
            rules: Rules::Parsed(content.to_string()),
        }
    }

    /// A permissive policy, used for missing robots.txt files
    pub fn allow_all() -> Self {
        Self {
            rules: Rules::AllowAll,
        }
    }

    /// A policy that refuses every URL
    pub fn deny_all() -> Self {
        Self {
            rules: Rules::DenyAll,
        }
    }

    /// Returns the raw robots.txt content, if any was parsed
    pub fn content(&self) -> Option<&str> {
        match &self.rules {
            Rules::Parsed(content) => Some(content),
            _ => None,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The full URL (or path) to check
    /// * `user_agent` - The user agent string; only its product token is matched
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.rules {
            Rules::AllowAll => true,
            Rules::DenyAll => false,
            Rules::Parsed(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, product_token(user_agent), url)
            }
        }
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let Rules::Parsed(content) = &self.rules else {
            return None;
        };

        let agent = product_token(user_agent).to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut in_group_rules = false;
        let mut delay_for_wildcard: Option<f64> = None;
        let mut delay_for_agent: Option<f64> = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if in_group_rules {
                        group.clear();
                        in_group_rules = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_group_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if !agent.is_empty() && group.iter().any(|ua| *ua == agent) {
                        delay_for_agent = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        delay_for_wildcard = Some(delay);
                    }
                }
                _ => in_group_rules = true,
            }
        }

        delay_for_agent
            .or(delay_for_wildcard)
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_or(MAX_CRAWL_DELAY, |delay| delay.min(MAX_CRAWL_DELAY))
            })
    }
}

/// Product token of a user agent, e.g. `SpiderScraper` for `SpiderScraper/1.0 (+url)`
pub fn product_token(user_agent: &str) -> &str {
    let end = user_agent
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(user_agent.len());
    &user_agent[..end]
}
