//! URL handling module for Spider-Scraper
//!
//! This module provides URL normalization, domain extraction, host matching,
//! and the link filter that decides which discovered URLs may be crawled.

mod domain;
mod filter;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, origin_of};
pub use filter::{DomainRestriction, LinkFilter};
pub use matcher::{matches_host, matches_subdomain};
pub use normalize::{normalize_parsed, normalize_url};
