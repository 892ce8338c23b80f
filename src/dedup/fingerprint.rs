//! URL canonicalization into dedup fingerprints.
//!
//! The fingerprint of a URL is
//! `method:<METHOD>query:<canonical query>@<scheme>://<netloc><canonical path>`,
//! followed by `#fragment` only when the URL still carries one.
//! Volatile numeric path segments are generalized to a placeholder run of the
//! same length and static-asset filenames collapse to one sentinel, so that
//! pagination ids and asset variants map onto the same key.

use crate::config::CrawlerOptions;
use crate::url::extract_netloc;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Replaces any static-asset filename when static collapsing is enabled
pub const STATIC_SENTINEL: &str = "S.STATIC";

/// Placeholder character for generalized numeric segments
const NUMERIC_PLACEHOLDER: char = 'A';

const STATIC_FILE_SUFFIXES: &[&str] = &[".html", ".htm", ".js", ".css"];

/// Canonical string key for a URL + method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives fingerprints; the single canonicalization path for insert and lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canonicalizer {
    filter_dothtml: bool,
    ignore_param_value: bool,
}

impl Canonicalizer {
    pub fn new(filter_dothtml: bool, ignore_param_value: bool) -> Self {
        Self {
            filter_dothtml,
            ignore_param_value,
        }
    }

    pub fn from_options(options: &CrawlerOptions) -> Self {
        Self::new(options.filter_dothtml, options.ignore_param_value)
    }

    /// Computes the fingerprint of `url` requested with `method`
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use sumi_pipeline::dedup::Canonicalizer;
    ///
    /// let canon = Canonicalizer::new(true, false);
    /// let a = canon.fingerprint(&Url::parse("http://site/item/123").unwrap(), "GET");
    /// let b = canon.fingerprint(&Url::parse("http://site/item/456").unwrap(), "get");
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str(), "method:GETquery:@http://site/item/AAA");
    /// ```
    pub fn fingerprint(&self, url: &Url, method: &str) -> Fingerprint {
        let mut items = BTreeMap::new();
        items.insert("method", method.to_ascii_uppercase());
        items.insert("query", self.canonical_query(url.query()));

        let prefix: String = items
            .iter()
            .map(|(key, value)| format!("{}:{}", key, value))
            .collect();

        let netloc = extract_netloc(url).unwrap_or_default();
        // Only present when fragments were kept for scheduling
        let fragment = url.fragment().map(|f| format!("#{}", f)).unwrap_or_default();

        Fingerprint(format!(
            "{}@{}://{}{}{}",
            prefix,
            url.scheme(),
            netloc,
            self.canonical_path(url.path()),
            fragment
        ))
    }

    fn canonical_path(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        let last = segments.len() - 1;

        let canonical: Vec<String> = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if i == last && self.is_static_asset(segment) {
                    STATIC_SENTINEL.to_string()
                } else {
                    generalize_segment(segment)
                }
            })
            .collect();

        format!("/{}", canonical.join("/"))
    }

    fn is_static_asset(&self, filename: &str) -> bool {
        self.filter_dothtml
            && STATIC_FILE_SUFFIXES
                .iter()
                .any(|suffix| filename.ends_with(suffix))
    }

    fn canonical_query(&self, query: Option<&str>) -> String {
        let query = match query {
            Some(q) if !q.is_empty() => q,
            _ => return String::new(),
        };

        let mut parts: Vec<&str> = query
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if self.ignore_param_value {
                    part.split('=').next().unwrap_or(part)
                } else {
                    part
                }
            })
            .collect();
        parts.sort_unstable();

        parts.join("&")
    }
}

/// Generalizes a purely numeric segment (optionally with `-` or `.` separators)
fn generalize_segment(segment: &str) -> String {
    if is_numeric_segment(segment) {
        std::iter::repeat(NUMERIC_PLACEHOLDER)
            .take(segment.chars().count())
            .collect()
    } else {
        segment.to_string()
    }
}

fn is_numeric_segment(segment: &str) -> bool {
    fn all_digits(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
    }

    all_digits(segment)
        || all_digits(&segment.replace('-', ""))
        || all_digits(&segment.replace('.', ""))
}
