//! Crawl statistics
//!
//! Workers bump lock-free counters while the crawl runs; a [`CrawlReport`]
//! snapshot is taken once the pool has stopped.

use crate::storage::{RunOutcome, RunStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared by all workers
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_dequeued: AtomicU64,
    pages_fetched: AtomicU64,
    pages_disallowed: AtomicU64,
    fetch_failures: AtomicU64,
    extract_failures: AtomicU64,
    links_enqueued: AtomicU64,
    records_extracted: AtomicU64,
    records_persisted: AtomicU64,
    records_rejected: AtomicU64,
    persist_failures: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_dequeued(&self) {
        self.pages_dequeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn page_disallowed(&self) {
        self.pages_disallowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn extract_failed(&self) {
        self.extract_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn links_enqueued(&self, count: usize) {
        self.links_enqueued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn records_extracted(&self, count: usize) {
        self.records_extracted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn records_persisted(&self, count: usize) {
        self.records_persisted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn records_rejected(&self, count: usize) {
        self.records_rejected
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn persist_failed(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot of the counters
    ///
    /// # Arguments
    ///
    /// * `elapsed` - Wall-clock duration of the run
    /// * `discarded` - Pending entries dropped by a drain
    /// * `interrupted` - Whether the run was drained before completing
    pub fn snapshot(&self, elapsed: Duration, discarded: u64, interrupted: bool) -> CrawlReport {
        CrawlReport {
            pages_dequeued: self.pages_dequeued.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            pages_disallowed: self.pages_disallowed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            extract_failures: self.extract_failures.load(Ordering::Relaxed),
            links_enqueued: self.links_enqueued.load(Ordering::Relaxed),
            records_extracted: self.records_extracted.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            discarded,
            interrupted,
            elapsed,
        }
    }
}

/// Final statistics of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Entries handed to workers
    pub pages_dequeued: u64,
    /// Pages fetched with a 2xx status
    pub pages_fetched: u64,
    /// Pages skipped because robots.txt disallows them
    pub pages_disallowed: u64,
    /// Pages given up on after retries or a non-2xx status
    pub fetch_failures: u64,
    pub extract_failures: u64,
    /// Links newly admitted to the frontier
    pub links_enqueued: u64,
    pub records_extracted: u64,
    pub records_persisted: u64,
    /// Records dropped for missing required fields
    pub records_rejected: u64,
    /// Batches the sink failed to write
    pub persist_failures: u64,
    /// Pending entries discarded by a drain
    pub discarded: u64,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl CrawlReport {
    /// Per-URL failures of any kind
    pub fn errors(&self) -> u64 {
        self.fetch_failures + self.extract_failures + self.persist_failures
    }

    pub fn status(&self) -> RunStatus {
        if self.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        }
    }

    /// Counters stored on the run row
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            status: self.status(),
            pages_fetched: self.pages_fetched,
            records_persisted: self.records_persisted,
            errors: self.errors(),
        }
    }
}

/// Prints the report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Status: {}", report.status().to_db_string());
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    println!("Pages:");
    println!("  Dequeued: {}", report.pages_dequeued);
    println!("  Fetched: {}", report.pages_fetched);
    println!("  Disallowed by robots.txt: {}", report.pages_disallowed);
    println!("  Fetch failures: {}", report.fetch_failures);
    println!("  Extraction failures: {}", report.extract_failures);
    println!("  Links enqueued: {}", report.links_enqueued);
    if report.interrupted {
        println!("  Discarded on interrupt: {}", report.discarded);
    }
    println!();

    println!("Records:");
    println!("  Extracted: {}", report.records_extracted);
    println!("  Persisted: {}", report.records_persisted);
    println!("  Rejected (incomplete): {}", report.records_rejected);
    println!("  Failed batches: {}", report.persist_failures);
    println!();

    let success_rate = if report.pages_dequeued > 0 {
        (report.pages_fetched as f64 / report.pages_dequeued as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} pages fetched)",
        success_rate, report.pages_fetched, report.pages_dequeued
    );
}
