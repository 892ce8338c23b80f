//! Near-duplicate URL filter
//!
//! This module bounds revisit explosion on two levels:
//! - exact repeats, via a Bloom filter over canonical fingerprints
//! - structurally similar URLs, via a Simhash index (enabled when the
//!   configured distance is greater than zero)
//!
//! Both levels sit behind [`UrlFilter`], which derives every fingerprint
//! through one [`Canonicalizer`] so lookups and inserts can never disagree.
//!
//! The filter is not internally synchronized. The pipeline dispatcher owns it
//! exclusively; any other caller mutating it concurrently must hold a lock
//! around each `is_duplicate` + `add` pair (or use [`UrlFilter::insert_if_new`]
//! under that lock).

mod bloom;
mod fingerprint;
mod simhash;

pub use bloom::BloomFilter;
pub use fingerprint::{Canonicalizer, Fingerprint, STATIC_SENTINEL};
pub use simhash::{Simhash, SimhashIndex};

use crate::config::CrawlerOptions;
use url::Url;

/// Tunables for a [`UrlFilter`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupSettings {
    pub filter_dothtml: bool,
    pub ignore_param_value: bool,
    /// Hamming distance threshold; 0 means exact matching only
    pub distance: u32,
    pub capacity: usize,
    pub error_rate: f64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self::from(&CrawlerOptions::default())
    }
}

impl From<&CrawlerOptions> for DedupSettings {
    fn from(options: &CrawlerOptions) -> Self {
        Self {
            filter_dothtml: options.filter_dothtml,
            ignore_param_value: options.ignore_param_value,
            distance: options.url_simhash_distance,
            capacity: options.bloom_capacity,
            error_rate: options.bloom_error_rate,
        }
    }
}

/// Membership + near-duplicate filter over URL fingerprints
#[derive(Debug, Clone)]
pub struct UrlFilter {
    canonicalizer: Canonicalizer,
    exact: BloomFilter,
    near: Option<SimhashIndex>,
}

impl UrlFilter {
    pub fn new(settings: DedupSettings) -> Self {
        let near = if settings.distance > 0 {
            Some(SimhashIndex::new(settings.distance))
        } else {
            None
        };

        Self {
            canonicalizer: Canonicalizer::new(settings.filter_dothtml, settings.ignore_param_value),
            exact: BloomFilter::new(settings.capacity, settings.error_rate),
            near,
        }
    }

    pub fn from_options(options: &CrawlerOptions) -> Self {
        Self::new(DedupSettings::from(options))
    }

    /// Canonical fingerprint used by every other operation
    pub fn fingerprint(&self, url: &Url, method: &str) -> Fingerprint {
        self.canonicalizer.fingerprint(url, method)
    }

    /// Returns true if the URL (or a near-duplicate of it) has been added
    pub fn is_duplicate(&self, url: &Url, method: &str) -> bool {
        self.contains_fingerprint(&self.fingerprint(url, method))
    }

    /// Records the URL as seen
    pub fn add(&mut self, url: &Url, method: &str) {
        let fingerprint = self.fingerprint(url, method);
        self.add_fingerprint(&fingerprint);
    }

    /// Test-then-insert in one step
    ///
    /// Returns the fingerprint if the URL was new (and is now recorded), or
    /// None if it was a duplicate.
    pub fn insert_if_new(&mut self, url: &Url, method: &str) -> Option<Fingerprint> {
        let fingerprint = self.fingerprint(url, method);
        if self.contains_fingerprint(&fingerprint) {
            tracing::trace!("duplicate fingerprint {}", fingerprint);
            return None;
        }
        self.add_fingerprint(&fingerprint);
        Some(fingerprint)
    }

    /// Number of distinct fingerprints recorded
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// True when near-duplicate detection is active
    pub fn detects_near_duplicates(&self) -> bool {
        self.near.is_some()
    }

    fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        if self.exact.contains(fingerprint.as_bytes()) {
            return true;
        }

        match &self.near {
            Some(index) => index.has_near_duplicate(&Simhash::of(fingerprint.as_str())),
            None => false,
        }
    }

    fn add_fingerprint(&mut self, fingerprint: &Fingerprint) {
        if self.exact.contains(fingerprint.as_bytes()) {
            return;
        }
        self.exact.insert(fingerprint.as_bytes());

        if let Some(index) = self.near.as_mut() {
            let signature = Simhash::of(fingerprint.as_str());
            if !index.has_near_duplicate(&signature) {
                index.add(signature);
            }
        }
    }
}
