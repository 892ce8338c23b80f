//! Sumi-Pipeline main entry point
//!
//! This is the command-line interface for the Sumi-Pipeline crawl core.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sumi_pipeline::config::{load_config_with_hash, validate, Config};
use sumi_pipeline::crawler::bus::NEW_URL;
use sumi_pipeline::crawler::{BusEvent, CrawlerPipeline, HtmlLinkExtractor, ReqwestFetcher};
use sumi_pipeline::output::print_report;
use sumi_pipeline::url::parse_fetchable;
use tracing_subscriber::EnvFilter;

/// Sumi-Pipeline: an embeddable crawl orchestration core
///
/// Crawls from a seed URL with a bounded worker pool, filtering discovered
/// links through a near-duplicate URL filter and a domain/suffix policy,
/// until no work remains.
#[derive(Parser, Debug)]
#[command(name = "sumi-pipeline")]
#[command(version = "1.0.0")]
#[command(about = "Concurrent crawl pipeline with near-duplicate URL filtering", long_about = None)]
struct Cli {
    /// URL the crawl starts from
    #[arg(value_name = "SEED_URL")]
    seed: String,

    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and seed, show the effective settings and exit
    #[arg(long)]
    dry_run: bool,

    /// Print every newly discovered URL
    #[arg(long, conflicts_with = "dry_run")]
    print_urls: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let cfg = Config::default();
            validate(&cfg)?;
            cfg
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli.seed)?;
    } else {
        handle_crawl(config, &cli.seed, cli.print_urls).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_pipeline=info,warn"),
            1 => EnvFilter::new("sumi_pipeline=debug,info"),
            2 => EnvFilter::new("sumi_pipeline=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates the seed and shows the settings
fn handle_dry_run(config: &Config, seed: &str) -> Result<(), Box<dyn std::error::Error>> {
    let seed = parse_fetchable(seed)?;
    let crawler = &config.crawler;

    println!("=== Sumi-Pipeline Dry Run ===\n");
    println!("Seed: {}", seed);

    println!("\nRequest Template:");
    println!("  Method: {}", config.request_params.method);
    for (name, value) in &config.request_params.headers {
        println!("  Header: {}: {}", name, value);
    }

    println!("\nCrawler Configuration:");
    println!("  Pool size: {}", crawler.poolsize);
    match crawler.queue_bound() {
        Some(capacity) => println!("  Queue capacity: {}", capacity),
        None => println!("  Queue capacity: unbounded"),
    }
    println!("  Simhash distance: {}", crawler.url_simhash_distance);
    println!("  Fixed cookie: {}", crawler.fixed_cookie);
    println!("  Allow fragment: {}", crawler.allow_fragment);
    println!("  Allow subdomains: {}", crawler.allow_to_crawl_subdomain);
    println!(
        "  Allow static files with query: {}",
        crawler.allow_static_file_with_query
    );

    println!("\nDomain Whitelist ({}):", crawler.domain_whitelist.len());
    for domain in &crawler.domain_whitelist {
        println!("  - {}", domain);
    }
    println!("\nDomain Blacklist ({}):", crawler.domain_blacklist.len());
    for domain in &crawler.domain_blacklist {
        println!("  - {}", domain);
    }
    println!("\nSuffix Blacklist: {}", crawler.suffix_blacklist.join(" "));

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    seed: &str,
    print_urls: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = ReqwestFetcher::new()?;
    let mut pipeline =
        CrawlerPipeline::new(config, Arc::new(fetcher), Arc::new(HtmlLinkExtractor))?;

    let printer = if print_urls {
        Some(pipeline.bus().link_handler(NEW_URL, |event| {
            if let BusEvent::NewUrl(url) = event {
                println!("{}", url);
            }
        })?)
    } else {
        None
    };

    let stop = pipeline.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, waiting for in-flight requests");
            stop.stop();
        }
    });

    pipeline.start_with_defaults(seed)?;

    let outcome = pipeline.wait_until_finished().await;
    match outcome {
        Ok(report) => {
            // Dropping the pipeline closes the bus so the printer can flush
            drop(pipeline);
            if let Some(printer) = printer {
                let _ = printer.await;
            }

            tracing::info!("Crawl completed successfully");
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
