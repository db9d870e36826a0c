//! Crawler module for the concurrent crawl engine
//!
//! This module contains the core crawling logic, including:
//! - The shared frontier with dedup, depth ceiling and termination detection
//! - HTTP fetching behind the transport trait
//! - Bounded retries with exponential backoff
//! - The worker pool and crawl lifecycle

mod coordinator;
mod frontier;
mod retry;
mod transport;
mod worker;

pub use coordinator::{Crawler, ShutdownHandle};
pub use frontier::{Frontier, FrontierEntry, SEED_DEPTH};
pub use retry::{Backoff, RetryPolicy, Retryable};
pub use transport::{
    build_http_client, FetchError, FetchedPage, HttpTransport, Transport, TransportError,
};

pub use crate::output::CrawlReport;
