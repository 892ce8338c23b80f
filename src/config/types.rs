use serde::Deserialize;
use std::collections::BTreeMap;

/// Suffixes rejected by default: binary documents and images.
const DEFAULT_SUFFIX_BLACKLIST: &[&str] = &[
    ".pdf", ".zip", ".docx", ".doc", ".ppt", ".pptx", ".jpg", ".png", ".gif", ".jpeg",
];

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; sumi-pipeline/1.0)";

/// Main configuration structure for the pipeline
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template used to build every request the pipeline schedules
    #[serde(rename = "request-params")]
    pub request_params: RequestParams,

    /// Crawl behaviour and filtering policy
    pub crawler: CrawlerOptions,
}

/// Default request-parameter template
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    /// HTTP method (e.g. "GET")
    pub method: String,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Query parameters appended to every request URL
    pub params: BTreeMap<String, String>,

    /// Optional request body
    pub body: Option<String>,

    /// Optional basic authentication
    pub auth: Option<BasicAuth>,

    /// Cookies sent with every request
    pub cookies: BTreeMap<String, String>,
}

impl Default for RequestParams {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());

        Self {
            method: "GET".to_string(),
            headers,
            params: BTreeMap::new(),
            body: None,
            auth: None,
            cookies: BTreeMap::new(),
        }
    }
}

/// Basic authentication credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Crawler behaviour configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerOptions {
    /// Number of concurrent fetch workers
    pub poolsize: usize,

    /// Bound on queued jobs; 0 means unbounded
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Reuse the seed request's cookies for every request
    #[serde(rename = "fixed-cookie")]
    pub fixed_cookie: bool,

    /// Hamming distance for near-duplicate detection; 0 disables it
    #[serde(rename = "url-simhash-distance")]
    pub url_simhash_distance: u32,

    /// Collapse static-asset filenames (.html, .htm, .js, .css) to one token
    #[serde(rename = "filter-dothtml")]
    pub filter_dothtml: bool,

    /// Keep only query parameter names when fingerprinting
    #[serde(rename = "ignore-param-value")]
    pub ignore_param_value: bool,

    /// Keep `#fragment` suffixes instead of stripping them
    #[serde(rename = "allow-fragment")]
    pub allow_fragment: bool,

    /// Follow subdomains of the seed host when no domain lists are set
    #[serde(rename = "allow-to-crawl-subdomain")]
    pub allow_to_crawl_subdomain: bool,

    /// Let blacklisted suffixes through when the URL carries a query
    #[serde(rename = "allow-static-file-with-query")]
    pub allow_static_file_with_query: bool,

    /// Host patterns ("example.com" or "*.example.com") allowed to be crawled
    #[serde(rename = "domain-whitelist")]
    pub domain_whitelist: Vec<String>,

    /// Host patterns never crawled
    #[serde(rename = "domain-blacklist")]
    pub domain_blacklist: Vec<String>,

    /// File extensions (with leading dot) never crawled
    #[serde(rename = "suffix-blacklist")]
    pub suffix_blacklist: Vec<String>,

    /// Expected number of distinct fingerprints
    #[serde(rename = "bloom-capacity")]
    pub bloom_capacity: usize,

    /// Target false-positive rate of the membership filter
    #[serde(rename = "bloom-error-rate")]
    pub bloom_error_rate: f64,

    /// How long the dispatcher waits for a result before re-checking termination
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            poolsize: 20,
            queue_capacity: 0,
            fixed_cookie: false,
            url_simhash_distance: 0,
            filter_dothtml: true,
            ignore_param_value: false,
            allow_fragment: false,
            allow_to_crawl_subdomain: false,
            allow_static_file_with_query: false,
            domain_whitelist: Vec::new(),
            domain_blacklist: Vec::new(),
            suffix_blacklist: DEFAULT_SUFFIX_BLACKLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bloom_capacity: 100_000,
            bloom_error_rate: 0.0001,
            poll_interval_ms: 2000,
        }
    }
}

impl CrawlerOptions {
    /// Returns the queue bound, or None when the queue is unbounded
    pub fn queue_bound(&self) -> Option<usize> {
        if self.queue_capacity == 0 {
            None
        } else {
            Some(self.queue_capacity)
        }
    }
}
