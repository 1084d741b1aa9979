use url::Url;

/// Extracts the lower-cased host from a URL
///
/// The port is not part of the result; `example.com:8080` and `example.com`
/// share a domain.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use spider_scraper::url::extract_domain;
///
/// let url = Url::parse("https://Blog.Example.COM:8443/post").unwrap();
/// assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the `scheme://host[:port]` origin robots.txt is served from
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
