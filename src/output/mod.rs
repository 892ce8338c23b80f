//! Output module for end-of-run crawl reports

mod report;

pub use report::{format_report, print_report, CrawlReport};
