//! Pipeline dispatcher - main crawl orchestration logic
//!
//! [`CrawlerPipeline`] wires the worker pool, the dedup filter, the policy
//! chain and the handler together. One dispatcher task consumes fetch results
//! and is the only writer of the crawl state, so the filter and the counters
//! need no locking:
//!
//! - drain a result from the pool (waiting at most the poll interval)
//! - extract links from the response body
//! - resolve, dedup, scope-check and veto each link
//! - submit accepted links as new fetch jobs
//! - stop once every started job has finished

use crate::config::{validate, validate_request_params, Config, RequestParams};
use crate::crawler::bus::{BusEvent, EventBus};
use crate::crawler::fetcher::{Fetcher, Response};
use crate::crawler::handler::{NoopHandler, PipelineHandler};
use crate::crawler::parser::LinkExtractor;
use crate::crawler::policy::{PolicyChain, Rejection};
use crate::crawler::pool::{Job, JobResult, WorkerPool};
use crate::crawler::request::{Request, Session};
use crate::dedup::UrlFilter;
use crate::output::CrawlReport;
use crate::state::{CrawlCounters, CrawlState, PhaseCell, PipelinePhase};
use crate::url::{extract_domain, parse_fetchable};
use crate::{PipelineError, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use url::Url;

/// Started/finished request counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineSummary {
    pub started_count: usize,
    pub finished_count: usize,
}

impl From<&CrawlCounters> for PipelineSummary {
    fn from(counters: &CrawlCounters) -> Self {
        Self {
            started_count: counters.started(),
            finished_count: counters.finished(),
        }
    }
}

/// Single-use crawl pipeline
pub struct CrawlerPipeline {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn LinkExtractor>,
    handler: Arc<dyn PipelineHandler>,
    bus: EventBus,
    phase: Arc<PhaseCell>,
    counters: Arc<CrawlCounters>,
    armed: Arc<AtomicBool>,
    state: Option<CrawlState>,
    dispatcher: Option<JoinHandle<DispatchOutcome>>,
    started_at: Option<DateTime<Utc>>,
    report: Option<CrawlReport>,
}

impl CrawlerPipeline {
    /// Creates a pipeline from a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Request template and crawler options
    /// * `fetcher` - Sends prepared requests
    /// * `extractor` - Reads raw links out of response bodies
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlerPipeline)` - Pipeline in the `Idle` phase
    /// * `Err(PipelineError::Config)` - The configuration failed validation
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn LinkExtractor>,
    ) -> Result<Self> {
        validate(&config)?;

        let state = CrawlState::new();
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            extractor,
            handler: Arc::new(NoopHandler),
            bus: EventBus::new(),
            phase: Arc::new(PhaseCell::default()),
            counters: state.counters(),
            armed: state.armed_flag(),
            state: Some(state),
            dispatcher: None,
            started_at: None,
            report: None,
        })
    }

    /// Registers the handler invoked at lifecycle points
    pub fn with_handler(mut self, handler: Arc<dyn PipelineHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Named broadcast channels of this pipeline
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase.get()
    }

    pub fn get_summary(&self) -> PipelineSummary {
        PipelineSummary::from(self.counters.as_ref())
    }

    /// Starts the crawl with the configured request template
    pub fn start_with_defaults(&mut self, seed_url: &str) -> Result<()> {
        let params = self.config.request_params.clone();
        self.start(seed_url, &params)
    }

    /// Starts the crawl at `seed_url`
    ///
    /// `params` only shapes the seed request. Every link found afterwards is
    /// requested with the configured `request-params` template. The cookies
    /// in `params` are replayed on those follow-up requests only when
    /// `fixed-cookie` is set.
    ///
    /// Must be called from within a tokio runtime. A pipeline can only be
    /// started once; a second call fails with `AlreadyStarted`.
    ///
    /// # Errors
    ///
    /// * `PipelineError::AlreadyStarted` - The pipeline was started before
    /// * `PipelineError::UrlError` - The seed is not a fetchable http(s) URL
    /// * `PipelineError::Config` - `params` names an unknown HTTP method
    pub fn start(&mut self, seed_url: &str, params: &RequestParams) -> Result<()> {
        if self.phase.get() != PipelinePhase::Idle {
            return Err(PipelineError::AlreadyStarted);
        }

        let seed = parse_fetchable(seed_url)?;
        validate_request_params(params)?;
        let seed_request = Request::from_template(seed.as_str(), params);
        seed_request.full_url()?;

        let mut state = self.state.take().ok_or(PipelineError::AlreadyStarted)?;
        let options = &self.config.crawler;
        let template = self.config.request_params.clone();

        let policy = PolicyChain::new(options, &seed);
        let mut filter = UrlFilter::from_options(options);
        // Links back to the seed are compared under the follow-up method
        filter.add(&seed, &template.method.to_ascii_uppercase());

        let session = if options.fixed_cookie {
            Session::with_cookies(params.cookies.clone())
        } else {
            Session::default()
        };

        let mut pool = WorkerPool::new(options.poolsize, options.queue_bound());
        let results = pool
            .take_results()
            .ok_or_else(|| PipelineError::Dispatcher("result channel unavailable".to_string()))?;
        pool.start()?;

        self.phase.advance(PipelinePhase::Started);
        self.started_at = Some(Utc::now());
        state.arm();
        tracing::info!(
            "Starting pipeline at {} with {} workers",
            seed,
            options.poolsize
        );

        let runner = Arc::new(RequestRunner {
            fetcher: Arc::clone(&self.fetcher),
            handler: Arc::clone(&self.handler),
            bus: self.bus.clone(),
            session,
        });

        let mut dispatcher = Dispatcher {
            state,
            filter,
            policy,
            pool,
            results,
            runner,
            extractor: Arc::clone(&self.extractor),
            handler: Arc::clone(&self.handler),
            bus: self.bus.clone(),
            template,
            phase: Arc::clone(&self.phase),
            poll_interval: Duration::from_millis(options.poll_interval_ms),
            failed: 0,
        };

        if let Some(domain) = extract_domain(&seed) {
            dispatcher.note_domain(&domain);
        }
        if let Err(e) = dispatcher.submit(seed_request) {
            dispatcher.state.disarm();
            self.phase.advance(PipelinePhase::Finished);
            return Err(e);
        }

        self.dispatcher = Some(tokio::spawn(dispatcher.run()));
        self.handler.on_pipeline_starting();
        Ok(())
    }

    /// Stops scheduling new work; in-flight jobs still drain
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Handle that can stop the pipeline from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            armed: Arc::clone(&self.armed),
            phase: Arc::clone(&self.phase),
        }
    }

    /// Waits for the dispatcher to exit and returns the crawl report
    ///
    /// Calling it again after the crawl finished returns the same report.
    pub async fn wait_until_finished(&mut self) -> Result<CrawlReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }

        let handle = self.dispatcher.take().ok_or(PipelineError::NotStarted)?;
        let outcome = handle
            .await
            .map_err(|e| PipelineError::Dispatcher(e.to_string()))?;

        let finished_at = Utc::now();
        let report = CrawlReport {
            summary: self.get_summary(),
            failed_count: outcome.failed,
            domains: outcome.domains,
            started_at: self.started_at.unwrap_or(finished_at),
            finished_at,
        };
        self.report = Some(report.clone());
        Ok(report)
    }
}

/// Clears the armed flag of a running pipeline
#[derive(Debug, Clone)]
pub struct StopHandle {
    armed: Arc<AtomicBool>,
    phase: Arc<PhaseCell>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.armed.store(false, Ordering::SeqCst);
        if self.phase.advance(PipelinePhase::Draining) {
            tracing::info!("Pipeline stopping, draining in-flight work");
        }
    }
}

/// What the dispatcher hands back when it exits
struct DispatchOutcome {
    domains: Vec<String>,
    failed: usize,
}

/// Per-job fetch logic, shared by every worker
struct RequestRunner {
    fetcher: Arc<dyn Fetcher>,
    handler: Arc<dyn PipelineHandler>,
    bus: EventBus,
    session: Session,
}

impl RequestRunner {
    async fn run(&self, request: Request) -> anyhow::Result<Response> {
        let request = self.handler.hook_before_preparing_request(request);
        let target = request.url.clone();
        let prepared = request
            .prepare(&self.session)
            .with_context(|| format!("preparing request for {}", target))?;

        let prepared = self.handler.hook_before_sending_request(prepared);
        self.handler.on_new_prepared_request(&prepared);
        self.bus.publish(BusEvent::NewRequest(prepared.clone()));

        tracing::info!("{} -> {}", prepared.method, prepared.url);
        let response = self.fetcher.fetch(prepared).await?;
        tracing::debug!("{} answered {}", response.url, response.status);
        Ok(response)
    }
}

/// The single consumer of fetch results
struct Dispatcher {
    state: CrawlState,
    filter: UrlFilter,
    policy: PolicyChain,
    pool: WorkerPool<Response>,
    results: UnboundedReceiver<JobResult<Response>>,
    runner: Arc<RequestRunner>,
    extractor: Arc<dyn LinkExtractor>,
    handler: Arc<dyn PipelineHandler>,
    bus: EventBus,
    template: RequestParams,
    phase: Arc<PhaseCell>,
    poll_interval: Duration,
    failed: usize,
}

impl Dispatcher {
    async fn run(mut self) -> DispatchOutcome {
        self.phase.advance(PipelinePhase::Running);
        tracing::info!("Dispatcher is running");
        let counters = self.state.counters();

        loop {
            if !self.state.is_running() {
                if counters.is_quiescent() {
                    break;
                }
                self.phase.advance(PipelinePhase::Draining);
            }

            match tokio::time::timeout(self.poll_interval, self.results.recv()).await {
                Ok(Some(result)) => self.handle_result(result),
                Ok(None) => {
                    tracing::warn!("Result channel closed with work outstanding");
                    break;
                }
                Err(_) => tracing::trace!(
                    "No result within {:?} ({} started, {} finished)",
                    self.poll_interval,
                    counters.started(),
                    counters.finished()
                ),
            }

            if counters.is_quiescent() {
                self.state.disarm();
            }
        }

        self.pool.shutdown().await;
        self.phase.advance(PipelinePhase::Finished);

        let summary = PipelineSummary::from(counters.as_ref());
        tracing::info!(
            "Dispatcher finished: {} started, {} finished, {} failed",
            summary.started_count,
            summary.finished_count,
            self.failed
        );
        self.handler.on_pipeline_finished(&summary);
        self.bus.publish(BusEvent::PipelineFinished(summary));

        DispatchOutcome {
            failed: self.failed,
            domains: self.state.into_domains(),
        }
    }

    fn handle_result(&mut self, result: JobResult<Response>) {
        self.state.counters().record_finished();

        match result.outcome {
            Err(e) => {
                self.failed += 1;
                tracing::warn!("Job {} failed: {:#}", result.job_id, e);
            }
            Ok(response) if self.state.is_running() => self.expand(&response),
            Ok(response) => {
                tracing::debug!("Not expanding {} while draining", response.url);
            }
        }
    }

    fn expand(&mut self, response: &Response) {
        let links = self.extractor.extract_links(&response.body);
        tracing::debug!("{} links found on {}", links.len(), response.url);

        for raw in links {
            if !self.state.is_running() {
                break;
            }

            match self.consider(&raw, &response.url) {
                Ok(url) => {
                    let request = Request::from_template(url.as_str(), &self.template);
                    if let Err(e) = self.submit(request) {
                        tracing::warn!("Could not schedule {}: {}", url, e);
                    }
                }
                Err(rejection) => tracing::debug!("Skipping {}: {}", raw, rejection),
            }
        }
    }

    /// Runs one raw link through the policy chain
    fn consider(&mut self, raw: &str, page_url: &Url) -> std::result::Result<Url, Rejection> {
        let url = self.policy.resolve(raw, page_url)?;

        let method = self.template.method.to_ascii_uppercase();
        if self.filter.insert_if_new(&url, &method).is_none() {
            return Err(Rejection::Duplicate);
        }
        self.handler.on_new_url(&url);
        self.bus.publish(BusEvent::NewUrl(url.clone()));

        if let Some(domain) = extract_domain(&url) {
            self.note_domain(&domain);
        }

        self.policy.check_scope(&url)?;

        if !self.handler.extra_url_checker(&url) {
            return Err(Rejection::Vetoed);
        }
        Ok(url)
    }

    fn note_domain(&mut self, domain: &str) {
        if self.state.record_domain(domain) {
            tracing::debug!("New domain: {}", domain);
            self.handler.on_new_domain(domain);
            self.bus.publish(BusEvent::NewDomain(domain.to_string()));
        }
    }

    fn submit(&mut self, request: Request) -> Result<()> {
        let counters = self.state.counters();
        counters.record_started();

        let runner = Arc::clone(&self.runner);
        let job = Job::new(move || async move { runner.run(request).await });

        if let Err(e) = self.pool.execute(job) {
            counters.revert_started();
            return Err(e);
        }
        Ok(())
    }
}
