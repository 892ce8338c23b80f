//! URL handling module
//!
//! This module provides domain extraction, wildcard domain matching, and the
//! resolution of raw extracted links into absolute, fetchable URLs.

mod domain;
mod matcher;
mod resolve;

// Re-export main functions
pub use domain::{extract_domain, extract_netloc};
pub use matcher::{matches_any, matches_wildcard};
pub use resolve::{extract_suffix, has_query, resolve_link};

use crate::UrlError;
use url::Url;

/// Parses a URL that the pipeline is expected to fetch
///
/// Only `http` and `https` URLs with a host are accepted; this is the check
/// applied to the seed URL before a crawl starts.
pub fn parse_fetchable(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}
