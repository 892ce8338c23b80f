use crate::config::types::{Config, CrawlerOptions, RequestParams};
use crate::dedup::BloomFilter;
use crate::ConfigError;

const MAX_POOLSIZE: usize = 256;

/// Largest meaningful Hamming distance between two 64-bit signatures
const MAX_SIMHASH_DISTANCE: u32 = 63;

/// Upper bound on the Bloom filter bit array (1 GiB)
const MAX_BLOOM_BITS: u64 = 1 << 33;

const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "TRACE", "CONNECT",
];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_request_params(&config.request_params)?;
    validate_crawler_options(&config.crawler)?;
    validate_domain_patterns(&config.crawler.domain_whitelist)?;
    validate_domain_patterns(&config.crawler.domain_blacklist)?;
    validate_suffixes(&config.crawler.suffix_blacklist)?;
    Ok(())
}

/// Validates a request template, including ones passed straight to `start()`
pub fn validate_request_params(params: &RequestParams) -> Result<(), ConfigError> {
    let method = params.method.to_ascii_uppercase();
    if !KNOWN_METHODS.contains(&method.as_str()) {
        return Err(ConfigError::Validation(format!(
            "unknown HTTP method '{}'",
            params.method
        )));
    }
    Ok(())
}

fn validate_crawler_options(options: &CrawlerOptions) -> Result<(), ConfigError> {
    if options.poolsize < 1 || options.poolsize > MAX_POOLSIZE {
        return Err(ConfigError::Validation(format!(
            "poolsize must be between 1 and {}, got {}",
            MAX_POOLSIZE, options.poolsize
        )));
    }

    if options.url_simhash_distance > MAX_SIMHASH_DISTANCE {
        return Err(ConfigError::Validation(format!(
            "url_simhash_distance must be <= {}, got {}",
            MAX_SIMHASH_DISTANCE, options.url_simhash_distance
        )));
    }

    if options.bloom_capacity < 1 {
        return Err(ConfigError::Validation(
            "bloom_capacity must be >= 1".to_string(),
        ));
    }

    if !(options.bloom_error_rate > 0.0 && options.bloom_error_rate < 1.0) {
        return Err(ConfigError::Validation(format!(
            "bloom_error_rate must be in (0, 1), got {}",
            options.bloom_error_rate
        )));
    }

    let bloom_bits = BloomFilter::required_bits(options.bloom_capacity, options.bloom_error_rate);
    if bloom_bits > MAX_BLOOM_BITS {
        return Err(ConfigError::Validation(format!(
            "bloom_capacity {} at error rate {} needs {} bits, more than the {} allowed",
            options.bloom_capacity, options.bloom_error_rate, bloom_bits, MAX_BLOOM_BITS
        )));
    }

    if options.poll_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "poll_interval_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_suffixes(suffixes: &[String]) -> Result<(), ConfigError> {
    for suffix in suffixes {
        if !suffix.starts_with('.') || suffix.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "suffix '{}' must start with '.' followed by an extension",
                suffix
            )));
        }
    }
    Ok(())
}

fn validate_domain_patterns(patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        validate_domain_pattern(pattern)?;
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)
    } else {
        validate_domain_string(pattern)
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
