//! Handler extension contract
//!
//! Embedding code observes or steers a crawl by implementing
//! [`PipelineHandler`]. Every method has a no-op default, so an implementation
//! overrides only the hooks it cares about.
//!
//! Hooks that run before a request is sent are called from worker tasks;
//! the rest are called from the dispatcher. Implementations must therefore
//! be `Send + Sync` and should not block.

use crate::crawler::request::{PreparedRequest, Request};
use crate::crawler::PipelineSummary;
use url::Url;

/// Capability set invoked by the pipeline at fixed lifecycle points
pub trait PipelineHandler: Send + Sync {
    /// Final veto on a candidate URL; returning `false` rejects it
    fn extra_url_checker(&self, _url: &Url) -> bool {
        true
    }

    /// Rewrites a request before it is prepared
    fn hook_before_preparing_request(&self, request: Request) -> Request {
        request
    }

    /// Rewrites a prepared request right before it is sent
    fn hook_before_sending_request(&self, request: PreparedRequest) -> PreparedRequest {
        request
    }

    /// A host was seen for the first time
    fn on_new_domain(&self, _domain: &str) {}

    /// A URL passed the dedup filter; fires even if the policy chain later rejects it
    fn on_new_url(&self, _url: &Url) {}

    /// A request has been prepared and is about to be sent
    fn on_new_prepared_request(&self, _request: &PreparedRequest) {}

    fn on_pipeline_starting(&self) {}

    fn on_pipeline_finished(&self, _summary: &PipelineSummary) {}
}

/// Handler with every hook left at its default
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl PipelineHandler for NoopHandler {}
