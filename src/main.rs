//! jobcrawl main entry point
//!
//! This is the command-line interface for the jobcrawl job listing crawler.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use jobcrawl::config::{parse_config, read_config, resolve_database_path, validate, Config};
use jobcrawl::output::print_report;
use jobcrawl::Crawler;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// jobcrawl: a polite job listing crawler
///
/// jobcrawl walks every page reachable from a seed URL on the same host, up
/// to a depth limit, while respecting robots.txt. Job listings found on the
/// pages are stored in a SQLite database, one database per run.
#[derive(Parser, Debug)]
#[command(name = "jobcrawl")]
#[command(version)]
#[command(about = "A polite job listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// URL to start crawling from
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Number of link levels to crawl (the seed is level 1)
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Number of concurrent workers
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Retries for transient fetch failures
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "N")]
    timeout_ms: Option<u64>,

    /// SQLite database path; `{timestamp}` is replaced by the start time
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// File receiving warnings and errors
    #[arg(long, value_name = "PATH")]
    error_log: Option<String>,

    /// Validate the configuration and print it without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = build_config(&cli)?;

    setup_logging(cli.verbose, cli.quiet, Path::new(&config.output.error_log))?;

    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    let database_path = resolve_database_path(&config.output.database_path, &Local::now());
    tracing::info!("Writing records to {}", database_path.display());

    let crawler = Crawler::from_config(&config, &database_path)
        .context("Failed to initialize crawler")?;
    tracing::info!("Started run {}", crawler.run_id());

    let report = crawler
        .run_until(shutdown_signal())
        .await
        .context("Crawl failed")?;

    if !cli.quiet {
        print_report(&report);
    }

    Ok(())
}

/// Loads the config file (or defaults), applies command-line overrides and
/// validates the result
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => parse_config("")?,
    };

    if let Some(seed) = &cli.seed {
        config.crawler.seed_url = seed.clone();
    }
    if let Some(max_depth) = cli.max_depth {
        config.crawler.max_depth = max_depth;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(retries) = cli.retries {
        config.crawler.max_retries = retries;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.crawler.request_timeout_ms = timeout_ms;
    }
    if let Some(database) = &cli.database {
        config.output.database_path = database.clone();
    }
    if let Some(error_log) = &cli.error_log {
        config.output.error_log = error_log.clone();
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Sets up console logging based on verbosity, plus the error log file
fn setup_logging(verbose: u8, quiet: bool, error_log: &Path) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("jobcrawl=info,warn"),
            1 => EnvFilter::new("jobcrawl=debug,info"),
            2 => EnvFilter::new("jobcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(filter);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(error_log)
        .with_context(|| format!("Failed to open error log {}", error_log.display()))?;
    let errors = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(console)
        .with(errors)
        .init();

    Ok(())
}

/// Handles the --dry-run mode: shows what would be crawled
fn print_dry_run(config: &Config) {
    println!("=== jobcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed: {}", config.crawler.seed_url);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Workers: {}", config.crawler.workers);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Error log: {}", config.output.error_log);

    println!("\nExtractor:");
    println!("  Listing: {}", config.extractor.listing);
    println!("  Title: {}", config.extractor.title);
    println!("  Application link: {}", config.extractor.application_link);

    println!("\n✓ Configuration is valid");
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing in-flight pages");
}
