/// Checks whether `candidate` is exactly `host`
///
/// Both sides are expected to be lower-cased already.
pub fn matches_host(host: &str, candidate: &str) -> bool {
    candidate == host
}

/// Checks whether `candidate` is `base` or any subdomain of it
///
/// # Examples
///
/// ```
/// use spider_scraper::url::matches_subdomain;
///
/// assert!(matches_subdomain("example.com", "example.com"));
/// assert!(matches_subdomain("example.com", "blog.example.com"));
/// assert!(matches_subdomain("example.com", "api.v2.example.com"));
/// assert!(!matches_subdomain("example.com", "notexample.com"));
/// ```
pub fn matches_subdomain(base: &str, candidate: &str) -> bool {
    match candidate.strip_suffix(base) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.') && prefix.len() > 1,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_host("example.com", "example.com"));
        assert!(!matches_host("example.com", "sub.example.com"));
        assert!(!matches_host("sub.example.com", "example.com"));
    }

    #[test]
    fn test_subdomain_matches_bare_domain() {
        assert!(matches_subdomain("example.com", "example.com"));
        assert!(matches_subdomain("github.io", "github.io"));
    }

    #[test]
    fn test_subdomain_matches_nested() {
        assert!(matches_subdomain("example.com", "www.example.com"));
        assert!(matches_subdomain("example.com", "deep.nested.sub.example.com"));
    }

    #[test]
    fn test_subdomain_no_partial_label_match() {
        assert!(!matches_subdomain("example.com", "myexample.com"));
        assert!(!matches_subdomain("example.com", "example.com.org"));
        assert!(!matches_subdomain("example.com", ".example.com"));
        assert!(!matches_subdomain("example.com", ""));
    }

    #[test]
    fn test_multi_label_base() {
        assert!(matches_subdomain("co.uk", "example.co.uk"));
        assert!(!matches_subdomain("co.uk", "co.jp"));
    }
}
