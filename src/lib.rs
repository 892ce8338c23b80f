//! Sumi-Pipeline: an embeddable crawl orchestration core
//!
//! This crate fetches pages from a seed URL, extracts outbound links, filters
//! them through a near-duplicate URL filter and a policy chain, and schedules
//! the survivors on a bounded worker pool until no frontier work remains.
//! Embedding code supplies policy through the [`crawler::PipelineHandler`]
//! hooks and the named channels of the [`crawler::EventBus`].

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

pub use crawler::JobId;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline has already been started")]
    AlreadyStarted,

    #[error("Pipeline has not been started")]
    NotStarted,

    #[error("Worker queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Job id {0} is already outstanding")]
    DuplicateContextId(JobId),

    #[error("Unknown bus channel: {0}")]
    UnknownChannel(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Dispatcher task failed: {0}")]
    Dispatcher(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlerPipeline, PipelineHandler, PipelineSummary};
pub use dedup::UrlFilter;
pub use state::PipelinePhase;
