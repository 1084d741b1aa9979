use crate::config::{DomainScope, FilterConfig};
use crate::url::matcher::{matches_host, matches_subdomain};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Runtime form of the configured domain scope
#[derive(Debug, Clone)]
pub enum DomainRestriction {
    Any,
    ExactHost(String),
    Subdomains(String),
    Pattern(Regex),
}

impl DomainRestriction {
    /// Resolves a configured scope against the seed URL
    ///
    /// A scope without an explicit host falls back to the seed's host.
    pub fn from_scope(scope: &DomainScope, seed: &Url) -> Result<Self, ConfigError> {
        let seed_host = || {
            seed.host_str()
                .map(str::to_lowercase)
                .ok_or_else(|| ConfigError::InvalidUrl(format!("Seed URL '{}' has no host", seed)))
        };

        Ok(match scope {
            DomainScope::Any => Self::Any,
            DomainScope::ExactHost { host } => Self::ExactHost(match host {
                Some(h) => h.to_lowercase(),
                None => seed_host()?,
            }),
            DomainScope::Subdomains { host } => Self::Subdomains(match host {
                Some(h) => h.to_lowercase(),
                None => seed_host()?,
            }),
            DomainScope::Pattern { pattern } => Self::Pattern(
                Regex::new(pattern)
                    .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?,
            ),
        })
    }

    pub fn allows(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        match self {
            Self::Any => true,
            Self::ExactHost(expected) => matches_host(expected, &host),
            Self::Subdomains(base) => matches_subdomain(base, &host),
            Self::Pattern(re) => re.is_match(&host),
        }
    }
}

/// Policy applied to every discovered link before it may enter the frontier
///
/// Rules are checked in order: domain restriction, file extension, keywords.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    domain: DomainRestriction,
    allow_extensions: Vec<String>,
    deny_extensions: Vec<String>,
    include_keywords: Vec<String>,
    exclude_keywords: Vec<String>,
}

impl LinkFilter {
    /// Creates a filter that only restricts domains
    pub fn new(domain: DomainRestriction) -> Self {
        Self {
            domain,
            allow_extensions: Vec::new(),
            deny_extensions: Vec::new(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }

    /// A filter that admits every HTTP(S) URL
    pub fn allow_all() -> Self {
        Self::new(DomainRestriction::Any)
    }

    pub fn from_config(config: &FilterConfig, seed: &Url) -> Result<Self, ConfigError> {
        Ok(Self {
            domain: DomainRestriction::from_scope(&config.domain, seed)?,
            allow_extensions: config.allow_extensions.iter().map(|e| clean_extension(e)).collect(),
            deny_extensions: config.deny_extensions.iter().map(|e| clean_extension(e)).collect(),
            include_keywords: config.include_keywords.iter().map(|k| k.to_lowercase()).collect(),
            exclude_keywords: config.exclude_keywords.iter().map(|k| k.to_lowercase()).collect(),
        })
    }

    pub fn with_allow_extensions(mut self, exts: &[&str]) -> Self {
        self.allow_extensions = exts.iter().map(|e| clean_extension(e)).collect();
        self
    }

    pub fn with_deny_extensions(mut self, exts: &[&str]) -> Self {
        self.deny_extensions = exts.iter().map(|e| clean_extension(e)).collect();
        self
    }

    pub fn with_keywords(mut self, include: &[&str], exclude: &[&str]) -> Self {
        self.include_keywords = include.iter().map(|k| k.to_lowercase()).collect();
        self.exclude_keywords = exclude.iter().map(|k| k.to_lowercase()).collect();
        self
    }

    pub fn domain(&self) -> &DomainRestriction {
        &self.domain
    }

    /// Returns true if the URL passes every configured rule
    pub fn allows(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        self.domain.allows(url) && self.extension_allowed(url) && self.keywords_allowed(url)
    }

    fn extension_allowed(&self, url: &Url) -> bool {
        let Some(ext) = path_extension(url.path()) else {
            // Extension-less paths are pages
            return true;
        };

        if self.deny_extensions.iter().any(|d| *d == ext) {
            return false;
        }

        self.allow_extensions.is_empty() || self.allow_extensions.iter().any(|a| *a == ext)
    }

    fn keywords_allowed(&self, url: &Url) -> bool {
        let haystack = url.as_str().to_lowercase();

        if self.exclude_keywords.iter().any(|k| haystack.contains(k.as_str())) {
            return false;
        }

        self.include_keywords.is_empty()
            || self.include_keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

fn clean_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Lower-cased extension of the last path segment, if any
fn path_extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_exact_host_excludes_subdomain() {
        let filter = LinkFilter::new(DomainRestriction::ExactHost("example.com".to_string()));
        assert!(filter.allows(&url("https://example.com/a")));
        assert!(!filter.allows(&url("https://sub.example.com/a")));
        assert!(!filter.allows(&url("https://other.org/a")));
    }

    #[test]
    fn test_subdomain_mode_includes_subdomain() {
        let filter = LinkFilter::new(DomainRestriction::Subdomains("example.com".to_string()));
        assert!(filter.allows(&url("https://example.com/a")));
        assert!(filter.allows(&url("https://sub.example.com/a")));
        assert!(!filter.allows(&url("https://badexample.com/a")));
    }

    #[test]
    fn test_pattern_matches_host() {
        let filter = LinkFilter::new(DomainRestriction::Pattern(
            Regex::new(r"^(docs|blog)\.example\.com$").unwrap(),
        ));
        assert!(filter.allows(&url("https://docs.example.com/x")));
        assert!(!filter.allows(&url("https://shop.example.com/x")));
    }

    #[test]
    fn test_scope_defaults_to_seed_host() {
        let seed = url("https://Example.com/start");
        let restriction =
            DomainRestriction::from_scope(&DomainScope::ExactHost { host: None }, &seed).unwrap();
        assert!(matches!(restriction, DomainRestriction::ExactHost(ref h) if h == "example.com"));
    }

    #[test]
    fn test_exact_host_ignores_port() {
        let filter = LinkFilter::new(DomainRestriction::ExactHost("127.0.0.1".to_string()));
        assert!(filter.allows(&url("http://127.0.0.1:4000/a")));
    }

    #[test]
    fn test_extension_allow_list() {
        let filter = LinkFilter::allow_all().with_allow_extensions(&[".html", "htm"]);
        assert!(filter.allows(&url("https://example.com/page.html")));
        assert!(filter.allows(&url("https://example.com/PAGE.HTM")));
        assert!(filter.allows(&url("https://example.com/section/")));
        assert!(filter.allows(&url("https://example.com/about")));
        assert!(!filter.allows(&url("https://example.com/file.pdf")));
    }

    #[test]
    fn test_extension_deny_list() {
        let filter = LinkFilter::allow_all().with_deny_extensions(&["pdf", ".zip"]);
        assert!(!filter.allows(&url("https://example.com/a/report.pdf")));
        assert!(!filter.allows(&url("https://example.com/bundle.zip")));
        assert!(filter.allows(&url("https://example.com/a/report")));
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        assert_eq!(path_extension("/.well-known"), None);
        assert_eq!(path_extension("/a.b/c"), None);
        assert_eq!(path_extension("/x/y.tar.gz"), Some("gz".to_string()));
    }

    #[test]
    fn test_keywords_exclude_wins() {
        let filter = LinkFilter::allow_all().with_keywords(&["docs"], &["Logout"]);
        assert!(filter.allows(&url("https://example.com/DOCS/intro")));
        assert!(!filter.allows(&url("https://example.com/docs/logout")));
        assert!(!filter.allows(&url("https://example.com/blog")));
    }

    #[test]
    fn test_non_http_rejected() {
        let filter = LinkFilter::allow_all();
        assert!(!filter.allows(&url("ftp://example.com/file")));
        assert!(!filter.allows(&url("mailto:a@example.com")));
    }
}
