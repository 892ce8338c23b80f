//! Integration tests for the crawl pipeline
//!
//! Most tests drive the full pipeline against an in-memory fetcher so the
//! link graph is exact; the last ones run the real `reqwest` fetcher against
//! a wiremock server.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_pipeline::config::{Config, RequestParams};
use sumi_pipeline::crawler::bus::{NEW_URL, PIPELINE_FINISHED};
use sumi_pipeline::crawler::{
    crawl, BusEvent, CrawlerPipeline, FetchError, Fetcher, HtmlLinkExtractor, PipelineHandler,
    PipelineSummary, PreparedRequest, Request, Response,
};
use sumi_pipeline::{PipelineError, PipelinePhase};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves a fixed link graph from memory and records every fetch
#[derive(Default)]
struct GraphFetcher {
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    fetched: Mutex<Vec<PreparedRequest>>,
}

impl GraphFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fetched_urls(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    fn fetch_count(&self, url: &str) -> usize {
        self.fetched_urls().iter().filter(|u| *u == url).count()
    }

    fn request_for(&self, url: &str) -> PreparedRequest {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.url.as_str() == url)
            .cloned()
            .unwrap_or_else(|| panic!("{} was never fetched", url))
    }
}

#[async_trait]
impl Fetcher for GraphFetcher {
    async fn fetch(&self, request: PreparedRequest) -> Result<Response, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.fetched.lock().unwrap().push(request.clone());

        let url = request.url.to_string();
        match self.pages.get(&url) {
            Some(body) => Ok(Response {
                status: 200,
                url: request.url,
                body: body.clone(),
            }),
            None => Err(FetchError::Transport {
                url,
                message: "connection refused".to_string(),
            }),
        }
    }
}

/// Records every hook invocation
#[derive(Default)]
struct RecordingHandler {
    new_urls: Mutex<Vec<String>>,
    new_domains: Mutex<Vec<String>>,
    prepared: AtomicUsize,
    starting: AtomicUsize,
    finished: Mutex<Vec<PipelineSummary>>,
    veto_prefix: Option<String>,
}

impl PipelineHandler for RecordingHandler {
    fn extra_url_checker(&self, url: &Url) -> bool {
        match &self.veto_prefix {
            Some(prefix) => !url.path().starts_with(prefix.as_str()),
            None => true,
        }
    }

    fn hook_before_preparing_request(&self, mut request: Request) -> Request {
        request
            .headers
            .insert("X-Pipeline-Test".to_string(), "yes".to_string());
        request
    }

    fn on_new_domain(&self, domain: &str) {
        self.new_domains.lock().unwrap().push(domain.to_string());
    }

    fn on_new_url(&self, url: &Url) {
        self.new_urls.lock().unwrap().push(url.to_string());
    }

    fn on_new_prepared_request(&self, _request: &PreparedRequest) {
        self.prepared.fetch_add(1, Ordering::SeqCst);
    }

    fn on_pipeline_starting(&self) {
        self.starting.fetch_add(1, Ordering::SeqCst);
    }

    fn on_pipeline_finished(&self, summary: &PipelineSummary) {
        self.finished.lock().unwrap().push(*summary);
    }
}

fn create_test_config() -> Config {
    let mut config = Config::default();
    config.crawler.poolsize = 4;
    config.crawler.poll_interval_ms = 50;
    config
}

fn build_pipeline(
    config: Config,
    fetcher: Arc<GraphFetcher>,
    handler: Arc<RecordingHandler>,
) -> CrawlerPipeline {
    CrawlerPipeline::new(config, fetcher, Arc::new(HtmlLinkExtractor))
        .expect("valid config")
        .with_handler(handler)
}

async fn run_to_completion(pipeline: &mut CrawlerPipeline, seed: &str) -> PipelineSummary {
    pipeline.start_with_defaults(seed).expect("pipeline starts");
    let report = tokio::time::timeout(Duration::from_secs(10), pipeline.wait_until_finished())
        .await
        .expect("pipeline terminates")
        .expect("dispatcher completes");
    report.summary
}

#[tokio::test]
async fn test_fragment_collapses_query_does_not() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        (
            "http://site/a",
            r#"<a href="http://site/a#frag">self</a><a href="http://site/a?x=1">query</a>"#,
        ),
        ("http://site/a?x=1", r#"<a href="/a">back</a>"#),
    ]));
    let handler = Arc::new(RecordingHandler::default());
    let mut pipeline = build_pipeline(create_test_config(), Arc::clone(&fetcher), handler);

    let summary = run_to_completion(&mut pipeline, "http://site/a").await;

    assert_eq!(fetcher.fetch_count("http://site/a"), 1);
    assert_eq!(fetcher.fetch_count("http://site/a?x=1"), 1);
    assert_eq!(summary.started_count, 2);
    assert_eq!(summary.finished_count, 2);
}

#[tokio::test]
async fn test_pool_size_one_ten_pages() {
    let names = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota"];
    let seed_body: String = names
        .iter()
        .map(|name| format!(r#"<a href="/{}">{}</a>"#, name, name))
        .collect();

    let mut pages = vec![("http://site/".to_string(), seed_body)];
    for name in names {
        pages.push((format!("http://site/{}", name), "leaf".to_string()));
    }
    let page_refs: Vec<(&str, &str)> = pages
        .iter()
        .map(|(url, body)| (url.as_str(), body.as_str()))
        .collect();

    let fetcher = Arc::new(GraphFetcher::new(&page_refs));
    let mut config = create_test_config();
    config.crawler.poolsize = 1;
    let mut pipeline = build_pipeline(config, Arc::clone(&fetcher), Arc::default());

    let summary = run_to_completion(&mut pipeline, "http://site/").await;

    assert_eq!(summary.started_count, 10);
    assert_eq!(summary.finished_count, 10);
    assert_eq!(pipeline.get_summary(), summary);
    assert_eq!(fetcher.fetched_urls().len(), 10);
}

#[tokio::test]
async fn test_suffix_blacklist_still_observed() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        (
            "http://site/",
            r#"<a href="/doc.pdf">pdf</a><a href="/doc.pdf?v=2">pdf v2</a>"#,
        ),
        ("http://site/doc.pdf?v=2", "%PDF"),
    ]));
    let handler = Arc::new(RecordingHandler::default());
    let mut config = create_test_config();
    config.crawler.suffix_blacklist = vec![".pdf".to_string()];
    config.crawler.allow_static_file_with_query = true;
    let mut pipeline = build_pipeline(config, Arc::clone(&fetcher), Arc::clone(&handler));

    run_to_completion(&mut pipeline, "http://site/").await;

    assert_eq!(fetcher.fetch_count("http://site/doc.pdf"), 0);
    assert_eq!(fetcher.fetch_count("http://site/doc.pdf?v=2"), 1);

    let observed = handler.new_urls.lock().unwrap().clone();
    assert!(observed.contains(&"http://site/doc.pdf".to_string()));
    assert!(observed.contains(&"http://site/doc.pdf?v=2".to_string()));
}

#[tokio::test]
async fn test_domain_whitelist_wildcard() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        (
            "http://www.example.com/",
            r#"<a href="http://api.example.com/x">api</a><a href="http://other.com/x">other</a>"#,
        ),
        ("http://api.example.com/x", "leaf"),
    ]));
    let handler = Arc::new(RecordingHandler::default());
    let mut config = create_test_config();
    config.crawler.domain_whitelist = vec!["*.example.com".to_string()];
    let mut pipeline = build_pipeline(config, Arc::clone(&fetcher), Arc::clone(&handler));

    let summary = run_to_completion(&mut pipeline, "http://www.example.com/").await;

    assert_eq!(fetcher.fetch_count("http://api.example.com/x"), 1);
    assert_eq!(fetcher.fetch_count("http://other.com/x"), 0);
    assert_eq!(summary.started_count, 2);

    // Every host is reported once, rejected or not
    let domains = handler.new_domains.lock().unwrap().clone();
    assert_eq!(domains, vec!["www.example.com", "api.example.com", "other.com"]);
}

#[tokio::test]
async fn test_off_site_links_rejected_by_default() {
    let fetcher = Arc::new(GraphFetcher::new(&[(
        "http://site/",
        r#"<a href="http://elsewhere.org/">away</a><a href="http://sub.site/">sub</a>"#,
    )]));
    let mut pipeline = build_pipeline(create_test_config(), Arc::clone(&fetcher), Arc::default());

    let summary = run_to_completion(&mut pipeline, "http://site/").await;

    assert_eq!(summary.started_count, 1);
    assert_eq!(fetcher.fetched_urls(), vec!["http://site/"]);
}

#[tokio::test]
async fn test_fetch_errors_do_not_stop_crawl() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        ("http://site/", r#"<a href="/broken">x</a><a href="/ok">y</a>"#),
        ("http://site/ok", r#"<a href="/deeper">z</a>"#),
        ("http://site/deeper", "leaf"),
    ]));
    let mut pipeline = build_pipeline(create_test_config(), Arc::clone(&fetcher), Arc::default());

    pipeline.start_with_defaults("http://site/").unwrap();
    let report = pipeline.wait_until_finished().await.unwrap();

    assert_eq!(report.failed_count, 1);
    assert_eq!(report.summary.started_count, 4);
    assert_eq!(report.summary.finished_count, 4);
    assert_eq!(fetcher.fetch_count("http://site/deeper"), 1);
}

#[tokio::test]
async fn test_handler_lifecycle_and_veto() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        ("http://site/", r#"<a href="/public">p</a><a href="/private/x">q</a>"#),
        ("http://site/public", "leaf"),
    ]));
    let handler = Arc::new(RecordingHandler {
        veto_prefix: Some("/private".to_string()),
        ..RecordingHandler::default()
    });
    let mut pipeline = build_pipeline(create_test_config(), Arc::clone(&fetcher), Arc::clone(&handler));

    let summary = run_to_completion(&mut pipeline, "http://site/").await;

    assert_eq!(fetcher.fetch_count("http://site/private/x"), 0);
    assert_eq!(fetcher.fetch_count("http://site/public"), 1);
    assert_eq!(handler.starting.load(Ordering::SeqCst), 1);
    assert_eq!(handler.prepared.load(Ordering::SeqCst), 2);
    assert_eq!(*handler.finished.lock().unwrap(), vec![summary]);

    // Request rewrites reach the fetcher
    let fetched = fetcher.fetched.lock().unwrap();
    assert!(fetched
        .iter()
        .all(|r| r.headers.get("X-Pipeline-Test").map(String::as_str) == Some("yes")));
}

#[tokio::test]
async fn test_double_start_rejected() {
    let fetcher = Arc::new(GraphFetcher::new(&[("http://site/", "")]));
    let mut pipeline = build_pipeline(create_test_config(), fetcher, Arc::default());

    pipeline.start_with_defaults("http://site/").unwrap();
    let second = pipeline.start_with_defaults("http://site/other");
    assert!(matches!(second, Err(PipelineError::AlreadyStarted)));

    pipeline.wait_until_finished().await.unwrap();
}

#[tokio::test]
async fn test_stop_drains_without_expanding() {
    let fetcher = Arc::new(
        GraphFetcher::new(&[("http://site/", r#"<a href="/a">a</a><a href="/b">b</a>"#)])
            .with_delay(Duration::from_millis(100)),
    );
    let mut pipeline = build_pipeline(create_test_config(), Arc::clone(&fetcher), Arc::default());

    pipeline.start_with_defaults("http://site/").unwrap();
    pipeline.stop();
    assert_eq!(pipeline.phase(), PipelinePhase::Draining);

    let report = pipeline.wait_until_finished().await.unwrap();
    assert_eq!(report.summary.started_count, 1);
    assert_eq!(report.summary.finished_count, 1);
    assert_eq!(fetcher.fetched_urls(), vec!["http://site/"]);
    assert_eq!(pipeline.phase(), PipelinePhase::Finished);
}

#[tokio::test]
async fn test_bus_channels_observe_crawl() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        ("http://site/", r#"<a href="/next">n</a>"#),
        ("http://site/next", "leaf"),
    ]));
    let mut pipeline = build_pipeline(create_test_config(), fetcher, Arc::default());

    let mut urls = pipeline.bus().subscribe(NEW_URL).unwrap();
    let mut finished = pipeline.bus().subscribe(PIPELINE_FINISHED).unwrap();
    assert!(matches!(
        pipeline.bus().subscribe("bogus"),
        Err(PipelineError::UnknownChannel(_))
    ));

    let summary = run_to_completion(&mut pipeline, "http://site/").await;

    match urls.try_recv().unwrap() {
        BusEvent::NewUrl(url) => assert_eq!(url.as_str(), "http://site/next"),
        other => panic!("unexpected event {:?}", other),
    }
    match finished.try_recv().unwrap() {
        BusEvent::PipelineFinished(reported) => assert_eq!(reported, summary),
        other => panic!("unexpected event {:?}", other),
    }
}

fn seed_params_with_cookie() -> RequestParams {
    let mut params = RequestParams::default();
    params.cookies.insert("sid".to_string(), "seed".to_string());
    params
}

fn cookie_of(request: &PreparedRequest) -> Option<&str> {
    request.headers.get("Cookie").map(String::as_str)
}

#[tokio::test]
async fn test_seed_cookies_stay_on_seed_without_fixed_cookie() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        ("http://site/", r#"<a href="/next">n</a>"#),
        ("http://site/next", "leaf"),
    ]));
    let mut pipeline = build_pipeline(create_test_config(), Arc::clone(&fetcher), Arc::default());

    pipeline
        .start("http://site/", &seed_params_with_cookie())
        .unwrap();
    pipeline.wait_until_finished().await.unwrap();

    assert_eq!(cookie_of(&fetcher.request_for("http://site/")), Some("sid=seed"));
    assert_eq!(cookie_of(&fetcher.request_for("http://site/next")), None);
}

#[tokio::test]
async fn test_fixed_cookie_replays_seed_cookies() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        ("http://site/", r#"<a href="/next">n</a>"#),
        ("http://site/next", "leaf"),
    ]));
    let mut config = create_test_config();
    config.crawler.fixed_cookie = true;
    let mut pipeline = build_pipeline(config, Arc::clone(&fetcher), Arc::default());

    pipeline
        .start("http://site/", &seed_params_with_cookie())
        .unwrap();
    pipeline.wait_until_finished().await.unwrap();

    assert_eq!(cookie_of(&fetcher.request_for("http://site/")), Some("sid=seed"));
    assert_eq!(
        cookie_of(&fetcher.request_for("http://site/next")),
        Some("sid=seed")
    );
}

#[tokio::test]
async fn test_follow_up_requests_use_configured_template() {
    let fetcher = Arc::new(GraphFetcher::new(&[
        ("http://site/", r#"<a href="/next">n</a>"#),
        ("http://site/next", "leaf"),
    ]));
    let mut config = create_test_config();
    config
        .request_params
        .headers
        .insert("X-Config".to_string(), "template".to_string());
    let mut pipeline = build_pipeline(config, Arc::clone(&fetcher), Arc::default());

    let mut seed_params = RequestParams::default();
    seed_params
        .headers
        .insert("X-Seed".to_string(), "only".to_string());
    pipeline.start("http://site/", &seed_params).unwrap();
    pipeline.wait_until_finished().await.unwrap();

    let seed = fetcher.request_for("http://site/");
    assert_eq!(seed.headers.get("X-Seed").map(String::as_str), Some("only"));
    assert!(!seed.headers.contains_key("X-Config"));

    let next = fetcher.request_for("http://site/next");
    assert_eq!(
        next.headers.get("X-Config").map(String::as_str),
        Some("template")
    );
    assert!(!next.headers.contains_key("X-Seed"));
}

#[tokio::test]
async fn test_near_duplicate_links_suppressed_during_crawl() {
    let pages = [
        (
            "http://site/catalog",
            r#"<a href="/catalog/shoes">s</a><a href="/catalog/boots">b</a>"#,
        ),
        ("http://site/catalog/shoes", "leaf"),
        ("http://site/catalog/boots", "leaf"),
    ];

    // Exact matching fetches every distinct URL
    let exact_fetcher = Arc::new(GraphFetcher::new(&pages));
    let mut exact = build_pipeline(create_test_config(), Arc::clone(&exact_fetcher), Arc::default());
    let summary = run_to_completion(&mut exact, "http://site/catalog").await;
    assert_eq!(summary.started_count, 3);

    // The widest distance treats every signature as a near match of the seed
    let handler = Arc::new(RecordingHandler::default());
    let near_fetcher = Arc::new(GraphFetcher::new(&pages));
    let mut config = create_test_config();
    config.crawler.url_simhash_distance = 63;
    let mut near = build_pipeline(config, Arc::clone(&near_fetcher), Arc::clone(&handler));
    let summary = run_to_completion(&mut near, "http://site/catalog").await;

    assert_eq!(summary.started_count, 1);
    assert_eq!(summary.finished_count, 1);
    assert_eq!(near_fetcher.fetched_urls(), vec!["http://site/catalog"]);
    assert!(handler.new_urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_refused_submissions_do_not_block_termination() {
    let seed_body: String = (1..=5)
        .map(|i| format!(r#"<a href="/page-{}">{}</a>"#, i, i))
        .collect();
    let mut pages = vec![("http://site/".to_string(), seed_body)];
    for i in 1..=5 {
        pages.push((format!("http://site/page-{}", i), "leaf".to_string()));
    }
    let page_refs: Vec<(&str, &str)> = pages
        .iter()
        .map(|(url, body)| (url.as_str(), body.as_str()))
        .collect();

    let fetcher = Arc::new(GraphFetcher::new(&page_refs));
    let mut config = create_test_config();
    config.crawler.poolsize = 1;
    config.crawler.queue_capacity = 1;
    let mut pipeline = build_pipeline(config, Arc::clone(&fetcher), Arc::default());

    let summary = run_to_completion(&mut pipeline, "http://site/").await;

    // Links are expanded in one pass, so only the first fits the queue
    assert_eq!(summary.started_count, 2);
    assert_eq!(summary.finished_count, 2);
    assert_eq!(fetcher.fetched_urls(), vec!["http://site/", "http://site/page-1"]);
}

#[tokio::test]
async fn test_crawl_against_http_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><a href="/next">next</a><img src="/logo.png"></body></html>"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/">home</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawl(create_test_config(), &format!("{}/", server.uri()))
        .await
        .unwrap();

    assert_eq!(report.summary.started_count, 2);
    assert_eq!(report.summary.finished_count, 2);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.domains, vec!["127.0.0.1"]);
}
