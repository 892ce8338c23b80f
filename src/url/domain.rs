use url::Url;

/// Extracts the domain (lowercase host, without port) from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_pipeline::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the network location (`host` or `host:port`) from a URL
///
/// Default ports are elided by the URL parser, so `http://a:80/` and
/// `http://a/` share the netloc `a`.
///
/// ```
/// use url::Url;
/// use sumi_pipeline::url::extract_netloc;
///
/// let url = Url::parse("http://127.0.0.1:3000/").unwrap();
/// assert_eq!(extract_netloc(&url), Some("127.0.0.1:3000".to_string()));
/// ```
pub fn extract_netloc(url: &Url) -> Option<String> {
    let domain = extract_domain(url)?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", domain, port)),
        None => Some(domain),
    }
}
