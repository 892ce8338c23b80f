//! End-of-run crawl report

use crate::crawler::PipelineSummary;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// What a finished pipeline hands back to its caller
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Final started/finished counts
    pub summary: PipelineSummary,

    /// Jobs whose fetch (or processing) failed
    pub failed_count: usize,

    /// Domains in the order they were first discovered
    pub domains: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    /// Wall-clock duration of the crawl
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Fraction of finished jobs that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let finished = self.summary.finished_count;
        if finished == 0 {
            return 0.0;
        }
        let succeeded = finished.saturating_sub(self.failed_count);
        (succeeded as f64 / finished as f64) * 100.0
    }
}

/// Formats the report as plain text
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl Report ===\n");
    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Started: {}", report.started_at.to_rfc3339());
    let _ = writeln!(out, "  Finished: {}", report.finished_at.to_rfc3339());
    let _ = writeln!(
        out,
        "  Duration: {:.2}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );
    let _ = writeln!(out, "  Jobs started: {}", report.summary.started_count);
    let _ = writeln!(out, "  Jobs finished: {}", report.summary.finished_count);
    let _ = writeln!(out, "  Jobs failed: {}", report.failed_count);
    let _ = writeln!(out, "  Success rate: {:.1}%", report.success_rate());

    if !report.domains.is_empty() {
        let _ = writeln!(out, "\nDomains Seen ({}):", report.domains.len());
        for domain in &report.domains {
            let _ = writeln!(out, "  - {}", domain);
        }
    }

    out
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
