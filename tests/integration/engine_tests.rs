//! Integration tests for the crawl engine
//!
//! These tests drive the engine over an in-memory link graph so that the
//! frontier, the worker pool, the politeness gate, retries and persistence can
//! be checked without a network.

use async_trait::async_trait;
use jobcrawl::config::CrawlerConfig;
use jobcrawl::crawler::{Crawler, FetchedPage, Transport, TransportError};
use jobcrawl::extract::{ExtractError, ExtractedPage, JobRecord, PageExtractor};
use jobcrawl::storage::{
    NewRun, PersistenceCoordinator, RecordSink, RunOutcome, RunStatus, SqliteSink, StorageError,
    StorageResult,
};
use jobcrawl::CrawlReport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

const SITE: &str = "http://site.test";

/// In-memory site: page bodies keyed by path
///
/// Bodies are line based: `link <href>` adds an outbound link, `job <title>`
/// adds a complete record, `broken` adds a record without title and
/// `malformed` makes the whole page fail extraction. Redirects are keyed by
/// the full URL, so a scheme or host change can be modelled.
#[derive(Default)]
struct SiteGraph {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    robots: Option<String>,
    failing: Vec<String>,
    delay: Duration,
    fetches: Mutex<Vec<String>>,
}

impl SiteGraph {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, path: &str, lines: &[&str]) -> Self {
        self.pages.insert(path.to_string(), lines.join("\n"));
        self
    }

    fn redirect(mut self, from: &str, location: &str) -> Self {
        self.redirects.insert(from.to_string(), location.to_string());
        self
    }

    fn robots(mut self, body: &str) -> Self {
        self.robots = Some(body.to_string());
        self
    }

    fn failing(mut self, path: &str) -> Self {
        self.failing.push(path.to_string());
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn fetch_count(&self, path: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|fetched| fetched.as_str() == path)
            .count()
    }

    fn fetched_paths(&self) -> Vec<String> {
        let mut paths = self.fetches.lock().unwrap().clone();
        paths.sort();
        paths
    }
}

#[async_trait]
impl Transport for SiteGraph {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedPage, TransportError> {
        let path = url.path().to_string();

        if path == "/robots.txt" {
            return Ok(match &self.robots {
                Some(body) => page(url, 200, body),
                None => page(url, 404, ""),
            });
        }

        self.fetches.lock().unwrap().push(path.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.contains(&path) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        if let Some(location) = self.redirects.get(url.as_str()) {
            let mut moved = page(url, 301, "");
            moved.location = Some(location.clone());
            return Ok(moved);
        }

        Ok(match self.pages.get(&path) {
            Some(body) => page(url, 200, body),
            None => page(url, 404, "not found"),
        })
    }
}

fn page(url: &Url, status: u16, body: &str) -> FetchedPage {
    FetchedPage {
        status,
        final_url: url.to_string(),
        body: body.to_string(),
        location: None,
    }
}

/// Extractor for the line based bodies served by [`SiteGraph`]
struct LineExtractor;

impl PageExtractor for LineExtractor {
    fn extract(&self, body: &str, page_url: &Url) -> Result<ExtractedPage, ExtractError> {
        let mut extracted = ExtractedPage::default();

        for line in body.lines() {
            if line == "malformed" {
                return Err(ExtractError::Malformed("test page".to_string()));
            } else if line == "broken" {
                extracted.records.push(JobRecord {
                    application_link: format!("{}/apply", page_url),
                    ..Default::default()
                });
            } else if let Some(href) = line.strip_prefix("link ") {
                extracted.links.push(href.to_string());
            } else if let Some(title) = line.strip_prefix("job ") {
                extracted.records.push(JobRecord {
                    title: title.to_string(),
                    application_link: format!("{}/apply", page_url),
                    source_url: page_url.to_string(),
                    ..Default::default()
                });
            }
        }

        Ok(extracted)
    }
}

/// Sink that keeps batches in memory
#[derive(Clone, Default)]
struct MemorySink {
    batches: Arc<Mutex<Vec<Vec<JobRecord>>>>,
    outcome: Arc<Mutex<Option<RunOutcome>>>,
    fail_appends: bool,
    fail_finish: bool,
}

impl MemorySink {
    fn records(&self) -> Vec<JobRecord> {
        self.batches.lock().unwrap().concat()
    }

    fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.lock().unwrap().clone()
    }
}

impl RecordSink for MemorySink {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn begin_run(&mut self, _run: &NewRun) -> StorageResult<i64> {
        Ok(1)
    }

    fn append(&mut self, _run_id: i64, records: &[JobRecord]) -> StorageResult<usize> {
        if self.fail_appends {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(records.len())
    }

    fn finish_run(&mut self, _run_id: i64, outcome: &RunOutcome) -> StorageResult<()> {
        if self.fail_finish {
            return Err(StorageError::RunNotFound(1));
        }
        *self.outcome.lock().unwrap() = Some(outcome.clone());
        Ok(())
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

fn test_config(max_depth: u32, workers: usize) -> CrawlerConfig {
    CrawlerConfig {
        seed_url: format!("{}/", SITE),
        max_depth,
        workers,
        max_retries: 3,
        backoff_initial_ms: 1,
        backoff_max_ms: 2,
        ..Default::default()
    }
}

fn new_run() -> NewRun {
    NewRun {
        seed_url: format!("{}/", SITE),
        config_hash: "test".to_string(),
    }
}

fn build_crawler(
    config: &CrawlerConfig,
    graph: &Arc<SiteGraph>,
    sink: Box<dyn RecordSink>,
) -> Crawler {
    let persistence = PersistenceCoordinator::open(sink, &new_run()).unwrap();
    Crawler::new(
        config,
        Arc::clone(graph) as Arc<dyn Transport>,
        Arc::new(LineExtractor),
        persistence,
    )
    .unwrap()
}

async fn crawl(config: &CrawlerConfig, graph: &Arc<SiteGraph>, sink: &MemorySink) -> CrawlReport {
    let crawler = build_crawler(config, graph, Box::new(sink.clone()));
    tokio::time::timeout(Duration::from_secs(10), crawler.run())
        .await
        .expect("crawl did not terminate")
        .expect("crawl failed")
}

/// Every node links to every node, itself included
fn complete_graph(nodes: usize) -> SiteGraph {
    let paths: Vec<String> = (0..nodes)
        .map(|i| if i == 0 { "/".to_string() } else { format!("/n{}", i) })
        .collect();

    let mut graph = SiteGraph::new();
    for (i, path) in paths.iter().enumerate() {
        let mut lines: Vec<String> = paths.iter().map(|p| format!("link {}", p)).collect();
        lines.push(format!("job node {}", i));
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        graph = graph.page(path, &lines);
    }
    graph
}

async fn assert_complete_graph_visited_once(workers: usize) {
    let graph = Arc::new(complete_graph(12).delay(Duration::from_millis(2)));
    let sink = MemorySink::default();

    let report = crawl(&test_config(5, workers), &graph, &sink).await;

    assert_eq!(report.pages_dequeued, 12);
    assert_eq!(report.pages_fetched, 12);
    assert_eq!(graph.fetched_paths().len(), 12);
    assert!(graph.fetched_paths().iter().all(|p| graph.fetch_count(p) == 1));
    assert_eq!(sink.records().len(), 12);
    assert!(!report.interrupted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_complete_graph_single_worker() {
    assert_complete_graph_visited_once(1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_complete_graph_eight_workers() {
    assert_complete_graph_visited_once(8).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_large_cyclic_graph_many_workers() {
    let nodes = 150;
    let path = |i: usize| if i == 0 { "/".to_string() } else { format!("/p/{}", i) };

    let mut graph = SiteGraph::new();
    for i in 0..nodes {
        let links = [
            format!("link {}", path((i + 1) % nodes)),
            format!("link {}", path((i * 7 + 3) % nodes)),
            format!("link {}", path((i * 13 + 5) % nodes)),
            "link /".to_string(),
        ];
        let title = format!("job {}", i);
        let mut lines: Vec<&str> = links.iter().map(String::as_str).collect();
        lines.push(&title);
        graph = graph.page(&path(i), &lines);
    }
    let graph = Arc::new(graph);
    let sink = MemorySink::default();

    let report = crawl(&test_config(1_000, 8), &graph, &sink).await;

    assert_eq!(report.pages_dequeued, nodes as u64);
    assert_eq!(graph.fetched_paths().len(), nodes);
    assert_eq!(report.records_persisted, nodes as u64);
}

#[tokio::test]
async fn test_self_loop_terminates_after_one_page() {
    let graph = Arc::new(SiteGraph::new().page("/", &["link /", "link ./", "job only"]));
    let sink = MemorySink::default();

    let report = crawl(&test_config(5, 4), &graph, &sink).await;

    assert_eq!(report.pages_dequeued, 1);
    assert_eq!(graph.fetch_count("/"), 1);
    assert_eq!(report.records_persisted, 1);
}

fn diamond_graph() -> SiteGraph {
    // A -> B, A -> C, B -> D, C -> D, D -> A
    SiteGraph::new()
        .page("/", &["link /b", "link /c", "job a"])
        .page("/b", &["link /d", "job b"])
        .page("/c", &["link d", "job c"])
        .page("/d", &["link /", "job d"])
}

#[tokio::test]
async fn test_depth_limit_on_diamond() {
    let graph = Arc::new(diamond_graph());
    let sink = MemorySink::default();

    let report = crawl(&test_config(2, 2), &graph, &sink).await;

    assert_eq!(graph.fetched_paths(), vec!["/", "/b", "/c"]);
    assert_eq!(report.pages_dequeued, 3);
}

#[tokio::test]
async fn test_diamond_visits_shared_child_once() {
    let graph = Arc::new(diamond_graph());
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetched_paths(), vec!["/", "/b", "/c", "/d"]);
    assert_eq!(graph.fetch_count("/d"), 1);
    assert_eq!(graph.fetch_count("/"), 1);
    assert_eq!(report.records_persisted, 4);
}

#[tokio::test]
async fn test_depth_ceiling_on_chain() {
    let mut graph = SiteGraph::new().page("/", &["link /1"]);
    for i in 1..10 {
        let link = format!("link /{}", i + 1);
        graph = graph.page(&format!("/{}", i), &[link.as_str()]);
    }
    let graph = Arc::new(graph);
    let sink = MemorySink::default();

    crawl(&test_config(4, 3), &graph, &sink).await;

    assert_eq!(graph.fetched_paths(), vec!["/", "/1", "/2", "/3"]);
}

#[tokio::test]
async fn test_off_host_links_not_followed() {
    let graph = Arc::new(
        SiteGraph::new()
            .page(
                "/",
                &[
                    "link https://elsewhere.test/jobs",
                    "link http://site.test:8080/other-port",
                    "link /local",
                ],
            )
            .page("/local", &["job local"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetched_paths(), vec!["/", "/local"]);
    assert_eq!(report.links_enqueued, 1);
}

#[tokio::test]
async fn test_retry_exhaustion_is_contained() {
    let graph = Arc::new(
        SiteGraph::new()
            .page("/", &["link /flaky", "link /fine", "job home"])
            .page("/fine", &["job fine"])
            .failing("/flaky"),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetch_count("/flaky"), 4);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.records_persisted, 2);
}

#[tokio::test]
async fn test_zero_retries_single_attempt() {
    let graph = Arc::new(
        SiteGraph::new()
            .page("/", &["link /flaky"])
            .failing("/flaky"),
    );
    let sink = MemorySink::default();
    let mut config = test_config(3, 1);
    config.max_retries = 0;

    crawl(&config, &graph, &sink).await;

    assert_eq!(graph.fetch_count("/flaky"), 1);
}

#[tokio::test]
async fn test_non_success_status_not_retried() {
    let graph = Arc::new(SiteGraph::new().page("/", &["link /missing", "job home"]));
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetch_count("/missing"), 1);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.errors(), 1);
}

#[tokio::test]
async fn test_disallowed_path_never_fetched() {
    let graph = Arc::new(
        SiteGraph::new()
            .robots("User-agent: *\nDisallow: /private\n")
            .page("/", &["link /private/board", "link /public"])
            .page("/private/board", &["job secret"])
            .page("/public", &["job open"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetch_count("/private/board"), 0);
    assert_eq!(graph.fetch_count("/public"), 1);
    assert_eq!(report.pages_disallowed, 1);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(sink.records()[0].title, "open");
}

#[tokio::test]
async fn test_malformed_policy_allows_all() {
    let graph = Arc::new(
        SiteGraph::new()
            .robots("<html><body>Server error</body></html>")
            .page("/", &["link /private/board"])
            .page("/private/board", &["job secret"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetch_count("/private/board"), 1);
    assert_eq!(report.pages_disallowed, 0);
}

#[tokio::test]
async fn test_disallowed_seed_ends_crawl() {
    let graph = Arc::new(
        SiteGraph::new()
            .robots("User-agent: *\nDisallow: /\n")
            .page("/", &["link /a"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 4), &graph, &sink).await;

    assert!(graph.fetched_paths().is_empty());
    assert_eq!(report.pages_dequeued, 1);
    assert_eq!(report.pages_disallowed, 1);
    assert_eq!(sink.outcome().unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_incomplete_records_filtered() {
    let graph = Arc::new(SiteGraph::new().page("/", &["job kept", "broken", "broken"]));
    let sink = MemorySink::default();

    let report = crawl(&test_config(1, 1), &graph, &sink).await;

    assert_eq!(report.records_extracted, 3);
    assert_eq!(report.records_persisted, 1);
    assert_eq!(report.records_rejected, 2);
    assert!(sink.records().iter().all(JobRecord::is_complete));
}

#[tokio::test]
async fn test_extraction_failure_is_contained() {
    let graph = Arc::new(
        SiteGraph::new()
            .page("/", &["link /bad", "link /good"])
            .page("/bad", &["malformed"])
            .page("/good", &["job good"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(report.extract_failures, 1);
    assert_eq!(report.records_persisted, 1);
}

#[tokio::test]
async fn test_persistence_failure_is_contained() {
    let graph = Arc::new(
        SiteGraph::new()
            .page("/", &["link /a", "job home"])
            .page("/a", &["job a"]),
    );
    let sink = MemorySink {
        fail_appends: true,
        ..Default::default()
    };

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.persist_failures, 2);
    assert_eq!(report.records_persisted, 0);
    assert_eq!(sink.outcome().unwrap().errors, 2);
}

#[tokio::test]
async fn test_run_outcome_recorded_on_close() {
    let graph = Arc::new(diamond_graph());
    let sink = MemorySink::default();

    crawl(&test_config(3, 2), &graph, &sink).await;

    let outcome = sink.outcome().unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.pages_fetched, 4);
    assert_eq!(outcome.records_persisted, 4);
    assert_eq!(outcome.errors, 0);
}

#[tokio::test]
async fn test_drain_before_run_fetches_nothing() {
    let graph = Arc::new(diamond_graph());
    let sink = MemorySink::default();
    let crawler = build_crawler(&test_config(3, 2), &graph, Box::new(sink.clone()));

    assert_eq!(crawler.shutdown_handle().drain(), 1);
    let report = crawler.run().await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.pages_dequeued, 0);
    assert_eq!(report.discarded, 1);
    assert!(graph.fetched_paths().is_empty());
    assert_eq!(sink.outcome().unwrap().status, RunStatus::Interrupted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_finishes_in_flight_pages() {
    let mut graph = SiteGraph::new().delay(Duration::from_millis(20));
    for i in 0..100 {
        let path = if i == 0 { "/".to_string() } else { format!("/{}", i) };
        let link = format!("link /{}", i + 1);
        let title = format!("job {}", i);
        graph = graph.page(&path, &[link.as_str(), title.as_str()]);
    }
    let graph = Arc::new(graph);
    let sink = MemorySink::default();
    let crawler = build_crawler(&test_config(200, 1), &graph, Box::new(sink.clone()));

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        crawler.run_until(tokio::time::sleep(Duration::from_millis(50))),
    )
    .await
    .expect("drain did not terminate")
    .unwrap();

    assert!(report.interrupted);
    assert!(report.pages_dequeued < 100);
    // The page in flight at drain time is still persisted
    assert_eq!(report.records_persisted, report.pages_fetched);
    assert_eq!(sink.records().len() as u64, report.pages_fetched);
    assert_eq!(sink.outcome().unwrap().status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_seed_rejected_when_depth_zero() {
    let graph = Arc::new(diamond_graph());
    let persistence =
        PersistenceCoordinator::open(Box::new(MemorySink::default()), &new_run()).unwrap();

    let result = Crawler::new(
        &test_config(0, 1),
        graph as Arc<dyn Transport>,
        Arc::new(LineExtractor),
        persistence,
    );

    assert!(matches!(result, Err(jobcrawl::CrawlError::SeedRejected(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_persistence_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("jobs.db");
    let graph = Arc::new(complete_graph(6));
    let config = test_config(3, 4);

    let mut run_ids = Vec::new();
    for _ in 0..2 {
        let sink = SqliteSink::open(&db_path).unwrap();
        let crawler = build_crawler(&config, &graph, Box::new(sink));
        run_ids.push(crawler.run_id());
        let report = crawler.run().await.unwrap();
        assert_eq!(report.records_persisted, 6);
    }

    let db = SqliteSink::open(&db_path).unwrap();
    assert_ne!(run_ids[0], run_ids[1]);
    for run_id in &run_ids {
        assert_eq!(db.count_jobs(Some(*run_id)).unwrap(), 6);
        let run = db.get_run(*run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.pages_fetched, 6);
        assert_eq!(run.records_persisted, 6);
    }
    assert_eq!(db.count_jobs(None).unwrap(), 12);

    let mut first: Vec<_> = db.load_jobs(run_ids[0]).unwrap();
    let mut second: Vec<_> = db.load_jobs(run_ids[1]).unwrap();
    first.sort_by(|a, b| a.title.cmp(&b.title));
    second.sort_by(|a, b| a.title.cmp(&b.title));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_back_link_and_depth_limit() {
    // A -> {B, C}, B -> {A, D}
    let graph = Arc::new(
        SiteGraph::new()
            .page("/", &["link /b", "link /c"])
            .page("/b", &["link /", "link /d"])
            .page("/c", &[])
            .page("/d", &[]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(2, 4), &graph, &sink).await;

    assert_eq!(graph.fetched_paths(), vec!["/", "/b", "/c"]);
    assert_eq!(report.pages_dequeued, 3);
    // Only B and C were admitted after the seed
    assert_eq!(report.links_enqueued, 2);
}

#[test]
fn test_concurrent_writers_sqlite_rows_intact() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("jobs.db");
    let sink = SqliteSink::open(&db_path).unwrap();
    let coordinator = Arc::new(PersistenceCoordinator::open(Box::new(sink), &new_run()).unwrap());
    let run_id = coordinator.run_id();

    let writers = 8;
    let per_writer = 40;
    let handles: Vec<_> = (0..writers)
        .map(|writer| {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                for batch in 0..4 {
                    let records: Vec<_> = (0..per_writer / 4)
                        .map(|i| JobRecord {
                            title: format!("w{}-b{}-r{}", writer, batch, i),
                            application_link: format!("{}/apply/{}/{}/{}", SITE, writer, batch, i),
                            ..Default::default()
                        })
                        .collect();
                    coordinator.append_records(&records).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    coordinator
        .close(&RunOutcome {
            status: RunStatus::Completed,
            pages_fetched: 0,
            records_persisted: (writers * per_writer) as u64,
            errors: 0,
        })
        .unwrap();

    let db = SqliteSink::open(&db_path).unwrap();
    let jobs = db.load_jobs(run_id).unwrap();
    assert_eq!(jobs.len(), writers * per_writer);
    assert!(jobs.iter().all(JobRecord::is_complete));

    let mut titles: Vec<_> = jobs.iter().map(|j| j.title.clone()).collect();
    titles.sort();
    titles.dedup();
    assert_eq!(titles.len(), writers * per_writer);
}

async fn assert_seed_redirect_followed(resolved: &str) {
    let graph = Arc::new(
        SiteGraph::new()
            .redirect(&format!("{}/", SITE), resolved)
            .page("/", &["link /a", "link /b", "link /", "job home"])
            .page("/a", &["job a"])
            .page("/b", &["link /a", "job b"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(report.pages_dequeued, 3);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.links_enqueued, 2);
    assert_eq!(report.records_persisted, 3);
    // One redirect answer plus the resolved page
    assert_eq!(graph.fetch_count("/"), 2);
    assert_eq!(graph.fetch_count("/a"), 1);
    assert!(sink
        .records()
        .iter()
        .all(|r| r.source_url.starts_with(resolved)));
}

#[tokio::test]
async fn test_seed_redirect_to_https_keeps_crawling() {
    assert_seed_redirect_followed("https://site.test/").await;
}

#[tokio::test]
async fn test_seed_redirect_to_www_keeps_crawling() {
    assert_seed_redirect_followed("http://www.site.test/").await;
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_not_followed() {
    let graph = Arc::new(
        SiteGraph::new()
            .robots("User-agent: *\nDisallow: /private\n")
            .redirect(&format!("{}/go", SITE), "/private/board")
            .page("/", &["link /go", "job home"])
            .page("/private/board", &["job secret"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetch_count("/go"), 1);
    assert_eq!(graph.fetch_count("/private/board"), 0);
    assert_eq!(report.pages_disallowed, 1);
    assert_eq!(report.pages_fetched, 1);
    assert!(sink.records().iter().all(|r| r.title != "secret"));
}

#[tokio::test]
async fn test_off_site_redirect_not_followed() {
    let graph = Arc::new(
        SiteGraph::new()
            .redirect(&format!("{}/partner", SITE), "https://elsewhere.test/jobs")
            .page("/", &["link /partner"])
            .page("/jobs", &["job elsewhere"]),
    );
    let sink = MemorySink::default();

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(graph.fetch_count("/jobs"), 0);
    assert_eq!(report.fetch_failures, 1);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_redirect_loop_bounded() {
    let graph = Arc::new(
        SiteGraph::new()
            .redirect(&format!("{}/loop", SITE), "/loop")
            .page("/", &["link /loop"]),
    );
    let sink = MemorySink::default();
    let mut config = test_config(3, 1);
    config.max_redirects = 3;

    let report = crawl(&config, &graph, &sink).await;

    assert_eq!(graph.fetch_count("/loop"), 4);
    assert_eq!(report.fetch_failures, 1);
}

#[tokio::test]
async fn test_close_failure_still_returns_report() {
    let graph = Arc::new(diamond_graph());
    let sink = MemorySink {
        fail_finish: true,
        ..Default::default()
    };

    let report = crawl(&test_config(3, 2), &graph, &sink).await;

    assert_eq!(report.pages_fetched, 4);
    assert_eq!(report.records_persisted, 4);
    assert!(sink.outcome().is_none());
}

/// Sink whose appends block the calling thread until `path` has been fetched
struct WaitingSink {
    graph: Arc<SiteGraph>,
    path: &'static str,
    stalled: Arc<AtomicBool>,
}

impl RecordSink for WaitingSink {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn begin_run(&mut self, _run: &NewRun) -> StorageResult<i64> {
        Ok(1)
    }

    fn append(&mut self, _run_id: i64, records: &[JobRecord]) -> StorageResult<usize> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while self.graph.fetch_count(self.path) == 0 {
            if Instant::now() >= deadline {
                self.stalled.store(true, Ordering::SeqCst);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(records.len())
    }

    fn finish_run(&mut self, _run_id: i64, _outcome: &RunOutcome) -> StorageResult<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_writes_do_not_stall_fetching() {
    // Single-threaded runtime: a write on the async thread would block the
    // second worker from fetching /a until the sink gives up.
    let graph = Arc::new(
        SiteGraph::new()
            .page("/", &["link /a", "job home"])
            .page("/a", &["job a"]),
    );
    let stalled = Arc::new(AtomicBool::new(false));
    let sink = WaitingSink {
        graph: Arc::clone(&graph),
        path: "/a",
        stalled: Arc::clone(&stalled),
    };
    let crawler = build_crawler(&test_config(3, 2), &graph, Box::new(sink));

    let report = tokio::time::timeout(Duration::from_secs(10), crawler.run())
        .await
        .expect("crawl did not terminate")
        .unwrap();

    assert!(!stalled.load(Ordering::SeqCst));
    assert_eq!(report.records_persisted, 2);
}
