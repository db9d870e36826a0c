//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Counting pages and records while the crawl runs
//! - Producing the end-of-run report

pub mod stats;

pub use stats::{print_report, CrawlReport, CrawlStats};
