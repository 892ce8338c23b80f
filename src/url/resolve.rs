//! Link resolution for extracted hrefs
//!
//! Turns a raw attribute value into an absolute, fetchable URL or drops it.

use url::Url;

/// Schemes that are never fetchable over HTTP
const REJECTED_SCHEMES: &[&str] = &["javascript:", "data:", "ftp:", "mailto:"];

/// Resolves a raw link against the page that contained it
///
/// # Resolution Steps
///
/// 1. Drop empty links and `javascript:`, `data:`, `ftp:`, `mailto:` links
/// 2. Resolve relative links against `base` (RFC 3986)
/// 3. Drop anything that is not http(s) after resolution
/// 4. Strip the fragment unless `allow_fragment` is set
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_pipeline::url::resolve_link;
///
/// let base = Url::parse("http://site/docs/index").unwrap();
/// let url = resolve_link("guide#intro", &base, false).unwrap();
/// assert_eq!(url.as_str(), "http://site/docs/guide");
/// ```
pub fn resolve_link(href: &str, base: &Url, allow_fragment: bool) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if REJECTED_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if !allow_fragment {
        url.set_fragment(None);
    }

    Some(url)
}

/// Extracts the file extension of the URL's last path segment
///
/// The extension keeps its leading dot and is lowercased. Dotfiles such as
/// `/.profile` have no extension.
///
/// ```
/// use url::Url;
/// use sumi_pipeline::url::extract_suffix;
///
/// let url = Url::parse("http://site/files/Report.PDF?v=2").unwrap();
/// assert_eq!(extract_suffix(&url), Some(".pdf".to_string()));
/// ```
pub fn extract_suffix(url: &Url) -> Option<String> {
    let filename = url.path().rsplit('/').next().unwrap_or("");
    let stem = filename.trim_start_matches('.');
    let dot = stem.rfind('.')?;
    Some(stem[dot..].to_ascii_lowercase())
}

/// Returns true if the URL carries a non-empty query string
pub fn has_query(url: &Url) -> bool {
    url.query().map(|q| !q.is_empty()).unwrap_or(false)
}
