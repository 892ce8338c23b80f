//! State module for tracking pipeline progress
//!
//! # Components
//!
//! - `PipelinePhase`: lifecycle state machine of a pipeline instance
//! - `CrawlState`: started/finished counters, armed flag and domains seen,
//!   owned by the dispatcher

mod crawl_state;
mod pipeline_phase;

pub use crawl_state::{CrawlCounters, CrawlState};
pub use pipeline_phase::{PhaseCell, PipelinePhase};
