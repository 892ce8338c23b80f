//! Configuration module for the pipeline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The resulting [`Config`] is an immutable value passed to constructors; nothing
//! in the crate reads configuration from global state.
//!
//! # Example
//!
//! ```no_run
//! use sumi_pipeline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pipeline.toml")).unwrap();
//! println!("Pipeline will use {} workers", config.crawler.poolsize);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BasicAuth, Config, CrawlerOptions, RequestParams};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_from_str, load_config_with_hash};
pub use validation::{validate, validate_request_params};
