use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Started/finished job counters
///
/// Written only by the dispatcher; other handles read them to build a
/// summary while the crawl is running.
#[derive(Debug, Default)]
pub struct CrawlCounters {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl CrawlCounters {
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    /// Undoes a `record_started` whose submission was refused
    pub fn revert_started(&self) {
        self.started.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn record_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// True when no submitted job is still outstanding
    pub fn is_quiescent(&self) -> bool {
        self.finished() >= self.started()
    }
}

/// Mutable crawl state, owned by the dispatcher
///
/// The counters and the armed flag are shared so that the pipeline handle
/// can report progress and request a stop; the domain set is touched only
/// from the dispatcher.
#[derive(Debug)]
pub struct CrawlState {
    counters: Arc<CrawlCounters>,
    armed: Arc<AtomicBool>,
    domains_seen: HashSet<String>,
    domain_order: Vec<String>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlState {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(CrawlCounters::default()),
            armed: Arc::new(AtomicBool::new(false)),
            domains_seen: HashSet::new(),
            domain_order: Vec::new(),
        }
    }

    pub fn counters(&self) -> Arc<CrawlCounters> {
        Arc::clone(&self.counters)
    }

    pub fn armed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.armed)
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Records a domain; returns true the first time it is seen
    pub fn record_domain(&mut self, domain: &str) -> bool {
        if self.domains_seen.contains(domain) {
            return false;
        }
        self.domains_seen.insert(domain.to_string());
        self.domain_order.push(domain.to_string());
        true
    }

    /// Domains in the order they were first seen
    pub fn domains(&self) -> &[String] {
        &self.domain_order
    }

    pub fn into_domains(self) -> Vec<String> {
        self.domain_order
    }
}
