//! Filtering policy chain
//!
//! Bounds the crawl to a domain/suffix envelope. The dispatcher applies the
//! stages in this order for every extracted link:
//!
//! 1. [`PolicyChain::resolve`]: scheme reject, relative resolution, fragment strip
//! 2. dedup filter (owned by the dispatcher, not by this chain)
//! 3. [`PolicyChain::check_domain`]
//! 4. [`PolicyChain::check_suffix`]
//! 5. the handler's `extra_url_checker` veto
//!
//! Each stage short-circuits to a [`Rejection`].

use crate::config::CrawlerOptions;
use crate::url::{extract_domain, extract_netloc, extract_suffix, has_query, matches_any, resolve_link};
use std::fmt;
use url::Url;

/// Why a candidate URL was not scheduled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not an http(s) link, or it could not be resolved
    Unfetchable,
    /// Fingerprint (or a near-duplicate) already seen
    Duplicate,
    /// Host is not in the whitelist
    NotWhitelisted(String),
    /// Host matches the blacklist
    Blacklisted(String),
    /// Host differs from the seed and no domain lists are configured
    OffSite(String),
    /// File extension is in the suffix blacklist
    Suffix(String),
    /// The handler's custom predicate returned false
    Vetoed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfetchable => write!(f, "unfetchable link"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::NotWhitelisted(host) => write!(f, "{} is not whitelisted", host),
            Self::Blacklisted(host) => write!(f, "{} is blacklisted", host),
            Self::OffSite(host) => write!(f, "{} is outside the seed site", host),
            Self::Suffix(suffix) => write!(f, "suffix {} is blacklisted", suffix),
            Self::Vetoed => write!(f, "vetoed by handler"),
        }
    }
}

/// Immutable per-crawl policy, read by the dispatcher for every link
#[derive(Debug, Clone)]
pub struct PolicyChain {
    seed_netloc: String,
    allow_fragment: bool,
    allow_subdomain: bool,
    allow_static_with_query: bool,
    whitelist: Vec<String>,
    blacklist: Vec<String>,
    suffix_blacklist: Vec<String>,
}

impl PolicyChain {
    /// Builds the chain for a crawl rooted at `seed`
    pub fn new(options: &CrawlerOptions, seed: &Url) -> Self {
        let lowered = |list: &[String]| -> Vec<String> {
            list.iter().map(|s| s.to_ascii_lowercase()).collect()
        };

        Self {
            seed_netloc: extract_netloc(seed).unwrap_or_default(),
            allow_fragment: options.allow_fragment,
            allow_subdomain: options.allow_to_crawl_subdomain,
            allow_static_with_query: options.allow_static_file_with_query,
            whitelist: lowered(&options.domain_whitelist),
            blacklist: lowered(&options.domain_blacklist),
            suffix_blacklist: lowered(&options.suffix_blacklist),
        }
    }

    pub fn seed_netloc(&self) -> &str {
        &self.seed_netloc
    }

    /// Resolves a raw link against the page that contained it
    pub fn resolve(&self, raw: &str, page_url: &Url) -> Result<Url, Rejection> {
        resolve_link(raw, page_url, self.allow_fragment).ok_or(Rejection::Unfetchable)
    }

    /// Domain scope check
    ///
    /// A configured whitelist takes precedence: the host must match one of
    /// its entries. Otherwise a configured blacklist rejects matching hosts
    /// and accepts everything else. With neither list, the netloc must equal
    /// the seed's, or be a subdomain of it when subdomains are allowed.
    pub fn check_domain(&self, url: &Url) -> Result<(), Rejection> {
        let host = extract_domain(url).ok_or(Rejection::Unfetchable)?;

        if !self.whitelist.is_empty() {
            return if matches_any(&self.whitelist, &host) {
                Ok(())
            } else {
                Err(Rejection::NotWhitelisted(host))
            };
        }

        if !self.blacklist.is_empty() {
            return if matches_any(&self.blacklist, &host) {
                Err(Rejection::Blacklisted(host))
            } else {
                Ok(())
            };
        }

        let netloc = extract_netloc(url).unwrap_or(host);
        if netloc == self.seed_netloc
            || (self.allow_subdomain && netloc.ends_with(&format!(".{}", self.seed_netloc)))
        {
            Ok(())
        } else {
            Err(Rejection::OffSite(netloc))
        }
    }

    /// Static-suffix blacklist check
    pub fn check_suffix(&self, url: &Url) -> Result<(), Rejection> {
        let suffix = match extract_suffix(url) {
            Some(suffix) => suffix,
            None => return Ok(()),
        };

        if !self.suffix_blacklist.contains(&suffix) {
            return Ok(());
        }
        if self.allow_static_with_query && has_query(url) {
            return Ok(());
        }
        Err(Rejection::Suffix(suffix))
    }

    /// Domain then suffix, the post-dedup part of the chain
    pub fn check_scope(&self, url: &Url) -> Result<(), Rejection> {
        self.check_domain(url)?;
        self.check_suffix(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn chain(options: CrawlerOptions) -> PolicyChain {
        PolicyChain::new(&options, &url("http://site/a"))
    }

    #[test]
    fn test_resolve_rejects_scripts_and_strips_fragment() {
        let policy = chain(CrawlerOptions::default());
        let page = url("http://site/dir/page");

        assert_eq!(policy.resolve("javascript:go()", &page), Err(Rejection::Unfetchable));
        assert_eq!(policy.resolve("mailto:a@b", &page), Err(Rejection::Unfetchable));
        assert_eq!(policy.resolve("other#x", &page).unwrap().as_str(), "http://site/dir/other");
    }

    #[test]
    fn test_fragment_kept_when_allowed() {
        let policy = chain(CrawlerOptions {
            allow_fragment: true,
            ..CrawlerOptions::default()
        });
        let resolved = policy.resolve("/a#frag", &url("http://site/")).unwrap();
        assert_eq!(resolved.fragment(), Some("frag"));
    }

    #[test]
    fn test_whitelist_wildcard() {
        let policy = chain(CrawlerOptions {
            domain_whitelist: vec!["*.example.com".to_string()],
            ..CrawlerOptions::default()
        });

        assert!(policy.check_domain(&url("http://api.example.com/x")).is_ok());
        assert_eq!(
            policy.check_domain(&url("http://other.com/x")),
            Err(Rejection::NotWhitelisted("other.com".to_string()))
        );
    }

    #[test]
    fn test_whitelist_tries_every_entry() {
        let policy = chain(CrawlerOptions {
            domain_whitelist: vec!["*.first.org".to_string(), "*.example.com".to_string()],
            ..CrawlerOptions::default()
        });
        assert!(policy.check_domain(&url("http://api.example.com/x")).is_ok());
    }

    #[test]
    fn test_whitelist_overrides_blacklist() {
        let policy = chain(CrawlerOptions {
            domain_whitelist: vec!["example.com".to_string()],
            domain_blacklist: vec!["example.com".to_string()],
            ..CrawlerOptions::default()
        });
        assert!(policy.check_domain(&url("http://example.com/")).is_ok());
    }

    #[test]
    fn test_blacklist_only() {
        let policy = chain(CrawlerOptions {
            domain_blacklist: vec!["*.ads.net".to_string()],
            ..CrawlerOptions::default()
        });

        assert!(matches!(
            policy.check_domain(&url("http://cdn.ads.net/x")),
            Err(Rejection::Blacklisted(_))
        ));
        // Anything not blacklisted is in scope, even off the seed site
        assert!(policy.check_domain(&url("http://other.com/x")).is_ok());
    }

    #[test]
    fn test_seed_site_fallback() {
        let policy = chain(CrawlerOptions::default());
        assert!(policy.check_domain(&url("http://site/b")).is_ok());
        assert!(matches!(
            policy.check_domain(&url("http://sub.site/b")),
            Err(Rejection::OffSite(_))
        ));
        assert!(matches!(
            policy.check_domain(&url("http://site:8080/b")),
            Err(Rejection::OffSite(_))
        ));
    }

    #[test]
    fn test_subdomain_fallback() {
        let policy = chain(CrawlerOptions {
            allow_to_crawl_subdomain: true,
            ..CrawlerOptions::default()
        });
        assert!(policy.check_domain(&url("http://sub.site/b")).is_ok());
        assert!(policy.check_domain(&url("http://site/b")).is_ok());
        assert!(policy.check_domain(&url("http://mysite/b")).is_err());
    }

    #[test]
    fn test_suffix_blacklist_with_query() {
        let policy = chain(CrawlerOptions {
            suffix_blacklist: vec![".pdf".to_string()],
            allow_static_file_with_query: true,
            ..CrawlerOptions::default()
        });

        assert_eq!(
            policy.check_suffix(&url("http://site/doc.pdf")),
            Err(Rejection::Suffix(".pdf".to_string()))
        );
        assert!(policy.check_suffix(&url("http://site/doc.pdf?v=2")).is_ok());
        assert!(policy.check_suffix(&url("http://site/doc.html")).is_ok());
    }

    #[test]
    fn test_suffix_blacklist_ignores_query_by_default() {
        let policy = chain(CrawlerOptions::default());
        assert!(policy.check_suffix(&url("http://site/img.PNG?v=2")).is_err());
        assert!(policy.check_suffix(&url("http://site/dir/")).is_ok());
    }

    #[test]
    fn test_check_scope_order() {
        let policy = chain(CrawlerOptions::default());
        assert!(matches!(
            policy.check_scope(&url("http://other.com/doc.pdf")),
            Err(Rejection::OffSite(_))
        ));
    }
}
