//! Crawler module for concurrent fetching and link-following
//!
//! This module contains the core crawl pipeline, including:
//! - A fixed-size worker pool that runs fetch jobs
//! - The request model and the fetch / link-extraction collaborators
//! - The filtering policy chain bounding the crawl
//! - The handler contract and named broadcast channels for extensions
//! - The dispatcher that turns results into new frontier work

pub mod bus;
mod fetcher;
mod handler;
mod parser;
mod pipeline;
mod policy;
mod pool;
mod request;

pub use bus::{BusEvent, EventBus};
pub use fetcher::{build_http_client, FetchError, Fetcher, ReqwestFetcher, Response};
pub use handler::{NoopHandler, PipelineHandler};
pub use parser::{FnLinkExtractor, HtmlLinkExtractor, LinkExtractor};
pub use pipeline::{CrawlerPipeline, PipelineSummary, StopHandle};
pub use policy::{PolicyChain, Rejection};
pub use pool::{Job, JobId, JobResult, WorkerPool};
pub use request::{PreparedRequest, Request, Session};

use crate::config::Config;
use crate::output::CrawlReport;
use std::sync::Arc;

/// Runs a complete crawl with the default collaborators
///
/// Builds a `reqwest`-backed fetcher and an HTML link extractor, crawls from
/// `seed_url` using the configured request template and waits for the
/// pipeline to go quiescent.
///
/// # Arguments
///
/// * `config` - The pipeline configuration
/// * `seed_url` - Where the crawl starts
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed
/// * `Err(PipelineError)` - Crawl could not be started
pub async fn crawl(config: Config, seed_url: &str) -> crate::Result<CrawlReport> {
    let fetcher = ReqwestFetcher::new().map_err(|e| FetchError::InvalidRequest {
        url: seed_url.to_string(),
        message: format!("failed to build HTTP client: {}", e),
    })?;

    let mut pipeline = CrawlerPipeline::new(config, Arc::new(fetcher), Arc::new(HtmlLinkExtractor))?;
    pipeline.start_with_defaults(seed_url)?;
    pipeline.wait_until_finished().await
}
