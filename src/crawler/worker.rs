//! Crawl worker loop
//!
//! Each worker repeatedly takes an entry from the frontier and runs it through
//! the politeness gate, the fetcher, the extractor and the persistence
//! coordinator. A failure on one URL never stops the worker.

use crate::crawler::frontier::{Frontier, FrontierEntry, SEED_DEPTH};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::transport::{FetchError, FetchedPage, Transport, TransportError};
use crate::extract::{JobRecord, PageExtractor};
use crate::output::CrawlStats;
use crate::robots::PolitenessGate;
use crate::storage::PersistenceCoordinator;
use crate::url::resolve_url;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Everything a worker needs, shared read-only across the pool
pub(crate) struct CrawlContext {
    pub frontier: Arc<Frontier>,
    pub gate: PolitenessGate,
    pub transport: Arc<dyn Transport>,
    pub extractor: Arc<dyn PageExtractor>,
    pub persistence: PersistenceCoordinator,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub max_redirects: usize,
    pub stats: CrawlStats,
}

/// Marks the entry done when dropped, including on panic
struct InFlight<'a> {
    frontier: &'a Frontier,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.frontier.mark_done();
    }
}

/// Runs one worker until the frontier reports completion or drains
pub(crate) async fn run_worker(id: usize, ctx: Arc<CrawlContext>) {
    tracing::debug!("Worker {} started", id);

    while let Some(entry) = ctx.frontier.dequeue().await {
        let _in_flight = InFlight {
            frontier: &ctx.frontier,
        };
        ctx.stats.page_dequeued();
        process_entry(&ctx, &entry).await;
    }

    tracing::debug!("Worker {} finished", id);
}

/// Processes a single frontier entry
///
/// This method:
/// 1. Checks robots.txt
/// 2. Fetches the page with retries, vetting every redirect hop
/// 3. Extracts records and links
/// 4. Enqueues new links one level deeper
/// 5. Persists the records
async fn process_entry(ctx: &Arc<CrawlContext>, entry: &FrontierEntry) {
    let url = &entry.url;
    tracing::debug!("Processing URL: {} (depth {})", url, entry.depth);

    if !ctx.gate.is_allowed(url).await {
        tracing::info!("URL {} disallowed by robots.txt", url);
        ctx.stats.page_disallowed();
        return;
    }

    let (page, page_url) = match fetch_page(ctx, entry).await {
        Ok(fetched) => fetched,
        Err(FetchError::Disallowed { url: target }) => {
            tracing::info!("URL {} redirects to {}, disallowed by robots.txt", url, target);
            ctx.stats.page_disallowed();
            return;
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", url, e);
            ctx.stats.fetch_failed();
            return;
        }
    };
    ctx.stats.page_fetched();

    if entry.depth == SEED_DEPTH && page_url != *url {
        ctx.frontier.rebase(&page_url);
    }

    let extracted = match ctx.extractor.extract(&page.body, &page_url) {
        Ok(extracted) => extracted,
        Err(e) => {
            tracing::warn!("Failed to extract {}: {}", url, e);
            ctx.stats.extract_failed();
            return;
        }
    };

    let next_depth = entry.depth + 1;
    let mut enqueued = 0;
    for link in &extracted.links {
        match resolve_url(&page_url, link) {
            Ok(target) => {
                if ctx.frontier.try_enqueue(target.as_str(), next_depth) {
                    enqueued += 1;
                }
            }
            Err(e) => tracing::trace!("Skipping link {:?} on {}: {}", link, page_url, e),
        }
    }
    ctx.stats.links_enqueued(enqueued);

    ctx.stats.records_extracted(extracted.records.len());
    persist_records(ctx, url, extracted.records, enqueued).await;
}

/// Hands the records to the persistence coordinator off the async threads
async fn persist_records(ctx: &Arc<CrawlContext>, url: &Url, records: Vec<JobRecord>, enqueued: usize) {
    let writer = Arc::clone(ctx);
    let appended =
        tokio::task::spawn_blocking(move || writer.persistence.append_records(&records)).await;

    match appended {
        Ok(Ok(summary)) => {
            ctx.stats.records_persisted(summary.persisted);
            ctx.stats.records_rejected(summary.rejected);
            tracing::debug!(
                "Processed {}: {} records, {} new links",
                url,
                summary.persisted,
                enqueued
            );
        }
        Ok(Err(e)) => {
            tracing::error!("Failed to persist records from {}: {}", url, e);
            ctx.stats.persist_failed();
        }
        Err(e) => {
            tracing::error!("Persistence task for {} failed: {}", url, e);
            ctx.stats.persist_failed();
        }
    }
}

/// Fetches a page under the retry policy, following redirects by hand
///
/// Each hop is retried on its own when the failure is transient. Before a
/// redirect is followed, its target must be on the crawled site (the seed may
/// leave it, and the crawl then moves with it) and allowed by robots.txt. A
/// non-2xx final status is a permanent failure and is not retried.
///
/// # Returns
///
/// The final page and the URL it was served from
async fn fetch_page(ctx: &CrawlContext, entry: &FrontierEntry) -> Result<(FetchedPage, Url), FetchError> {
    let mut target = entry.url.clone();
    let mut hops = 0;

    loop {
        let page = ctx
            .retry
            .run(target.as_str(), || ctx.transport.fetch(&target, ctx.request_timeout))
            .await?;

        let Some(next) = page.redirect_target()? else {
            if !page.is_success() {
                return Err(FetchError::Status {
                    status: page.status,
                });
            }
            let served_from = Url::parse(&page.final_url).unwrap_or(target);
            return Ok((page, served_from));
        };

        if hops == ctx.max_redirects {
            return Err(TransportError::Redirect(format!(
                "more than {} redirects from {}",
                ctx.max_redirects, entry.url
            ))
            .into());
        }
        hops += 1;

        if entry.depth != SEED_DEPTH && !ctx.frontier.in_scope(&next) {
            return Err(FetchError::OffSite {
                url: next.to_string(),
            });
        }
        if !ctx.gate.is_allowed(&next).await {
            return Err(FetchError::Disallowed {
                url: next.to_string(),
            });
        }

        tracing::debug!("Following redirect {} -> {}", target, next);
        target = next;
    }
}
