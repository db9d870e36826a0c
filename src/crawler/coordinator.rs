//! Crawler coordinator - crawl lifecycle and worker pool
//!
//! This module wires the crawl engine together and owns its lifecycle:
//! - Seeding the frontier and opening the run in storage
//! - Spawning a fixed pool of workers
//! - Draining gracefully on shutdown
//! - Closing the record sink and producing the final report

use crate::config::{compute_config_hash, Config, CrawlerConfig};
use crate::crawler::frontier::{Frontier, SEED_DEPTH};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::transport::{HttpTransport, Transport};
use crate::crawler::worker::{run_worker, CrawlContext};
use crate::extract::{JobListingExtractor, PageExtractor};
use crate::output::{CrawlReport, CrawlStats};
use crate::robots::PolitenessGate;
use crate::storage::{NewRun, PersistenceCoordinator, RunOutcome, RunStatus, SqliteSink};
use crate::url::normalize_url;
use crate::{CrawlError, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// How often the progress line is logged
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Requests a graceful stop of a running crawl
///
/// Draining discards pending work and stops admitting new URLs; pages already
/// being processed finish and their records are persisted.
#[derive(Clone)]
pub struct ShutdownHandle {
    frontier: Arc<Frontier>,
}

impl ShutdownHandle {
    /// Starts draining and returns the number of discarded pending entries
    pub fn drain(&self) -> usize {
        let discarded = self.frontier.drain();
        tracing::info!(
            "Draining crawl: {} pending URLs discarded, {} in flight",
            discarded,
            self.frontier.in_flight()
        );
        discarded
    }
}

/// Main crawler structure
pub struct Crawler {
    context: Arc<CrawlContext>,
    workers: usize,
}

impl Crawler {
    /// Creates a crawler from its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Crawler settings
    /// * `transport` - Transport for pages and robots.txt
    /// * `extractor` - Page extractor
    /// * `persistence` - Coordinator over the run's record sink
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Frontier seeded, ready to run
    /// * `Err(CrawlError)` - The seed URL is unusable
    pub fn new(
        config: &CrawlerConfig,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn PageExtractor>,
        persistence: PersistenceCoordinator,
    ) -> Result<Self> {
        let seed = match normalize_url(&config.seed_url) {
            Ok(seed) => seed,
            Err(e) => {
                abandon_run(&persistence);
                return Err(e.into());
            }
        };

        let frontier = Arc::new(Frontier::new(seed.clone(), config.max_depth));
        if !frontier.try_enqueue(seed.as_str(), SEED_DEPTH) {
            abandon_run(&persistence);
            return Err(CrawlError::SeedRejected(config.seed_url.clone()));
        }

        let gate = PolitenessGate::new(Arc::clone(&transport), config.policy_timeout());

        let context = CrawlContext {
            frontier,
            gate,
            transport,
            extractor,
            persistence,
            retry: RetryPolicy::from_config(config),
            request_timeout: config.request_timeout(),
            max_redirects: config.max_redirects,
            stats: CrawlStats::new(),
        };

        Ok(Self {
            context: Arc::new(context),
            workers: config.workers.max(1),
        })
    }

    /// Creates a crawler with the HTTP transport, the CSS extractor and a
    /// SQLite sink at `database_path`
    pub fn from_config(config: &Config, database_path: &Path) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.crawler)?);
        let extractor: Arc<dyn PageExtractor> =
            Arc::new(JobListingExtractor::new(&config.extractor)?);

        let sink = SqliteSink::open(database_path)?;
        let run = NewRun {
            seed_url: config.crawler.seed_url.clone(),
            config_hash: compute_config_hash(config)?,
        };
        let persistence = PersistenceCoordinator::open(Box::new(sink), &run)?;

        Self::new(&config.crawler, transport, extractor, persistence)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            frontier: Arc::clone(&self.context.frontier),
        }
    }

    pub fn run_id(&self) -> i64 {
        self.context.persistence.run_id()
    }

    /// Runs the crawl until the frontier is exhausted or drained
    ///
    /// The record sink is closed before returning, so the report's counters
    /// are also stored on the run row. A failure to close the sink is logged;
    /// the crawl itself already finished and its report is still returned.
    pub async fn run(self) -> Result<CrawlReport> {
        let started = Instant::now();
        tracing::info!(
            "Starting crawl of {} with {} workers (max depth {}, {} retries)",
            self.context.frontier.scope(),
            self.workers,
            self.context.frontier.max_depth(),
            self.context.retry.max_retries()
        );

        let progress = tokio::spawn(report_progress(Arc::clone(&self.context)));

        let mut pool = JoinSet::new();
        for id in 0..self.workers {
            pool.spawn(run_worker(id, Arc::clone(&self.context)));
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }
        progress.abort();

        let frontier = &self.context.frontier;
        let report = self.context.stats.snapshot(
            started.elapsed(),
            frontier.discarded_total(),
            frontier.is_draining(),
        );

        if let Err(e) = self.context.persistence.close(&report.outcome()) {
            tracing::error!("Failed to close record sink for run {}: {}", self.run_id(), e);
        }

        tracing::info!(
            "Crawl {}: {} pages fetched, {} records persisted, {} errors in {:?}",
            report.status().to_db_string(),
            report.pages_fetched,
            report.records_persisted,
            report.errors(),
            report.elapsed
        );

        Ok(report)
    }

    /// Runs the crawl, draining as soon as `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<CrawlReport>
    where
        F: Future<Output = ()>,
    {
        let handle = self.shutdown_handle();
        let crawl = self.run();
        tokio::pin!(crawl);

        tokio::select! {
            report = &mut crawl => return report,
            _ = shutdown => {
                handle.drain();
            }
        }

        crawl.await
    }
}

/// Marks a run that never started as failed
fn abandon_run(persistence: &PersistenceCoordinator) {
    let outcome = RunOutcome {
        status: RunStatus::Failed,
        pages_fetched: 0,
        records_persisted: 0,
        errors: 0,
    };
    if let Err(e) = persistence.close(&outcome) {
        tracing::error!("Failed to close record sink: {}", e);
    }
}

async fn report_progress(context: Arc<CrawlContext>) {
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = context.stats.snapshot(Duration::ZERO, 0, false);
        tracing::info!(
            "Progress: {} pages fetched, {} discovered, {} pending, {} in flight, {} records persisted",
            report.pages_fetched,
            context.frontier.visited_len(),
            context.frontier.pending_len(),
            context.frontier.in_flight(),
            report.records_persisted
        );
    }
}
