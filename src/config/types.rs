use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for jobcrawl
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    pub extractor: ExtractorConfig,
}

/// Crawler behavior configuration
///
/// Immutable for the lifetime of a run and shared read-only by every
/// component.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// URL the crawl starts from; also the base for relative URLs
    pub seed_url: String,

    /// Number of link levels to crawl; the seed is level 1
    pub max_depth: u32,

    /// Number of concurrent workers
    pub workers: usize,

    /// Retries after the first failed attempt of a transient fetch error
    pub max_retries: u32,

    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Delay before the first retry (milliseconds)
    pub backoff_initial_ms: u64,

    /// Growth factor applied to the delay after each retry
    pub backoff_multiplier: f64,

    /// Upper bound on a single retry delay (milliseconds)
    pub backoff_max_ms: u64,

    /// Maximum number of redirect hops followed per request
    pub max_redirects: usize,

    /// Timeout for fetching robots.txt (milliseconds)
    pub policy_timeout_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn policy_timeout(&self) -> Duration {
        Duration::from_millis(self.policy_timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_url: "https://example.com/".to_string(),
            max_depth: 5,
            workers: 8,
            max_retries: 3,
            request_timeout_ms: 10_000,
            backoff_initial_ms: 500,
            backoff_multiplier: 2.0,
            backoff_max_ms: 10_000,
            max_redirects: 3,
            policy_timeout_ms: 5_000,
            user_agent: format!("jobcrawl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database; `{timestamp}` is expanded at startup
    pub database_path: String,

    /// File that receives warnings and errors with timestamps
    pub error_log: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "jobs_{timestamp}.db".to_string(),
            error_log: "error.log".to_string(),
        }
    }
}

/// CSS selectors used by the job listing extractor
///
/// Field selectors are evaluated relative to each listing element; the first
/// match wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractorConfig {
    pub listing: String,
    pub title: String,
    pub location: String,
    pub salary: String,
    pub date_posted: String,
    pub due_date: String,
    pub email: String,
    pub application_link: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            listing: "div.job-listing".to_string(),
            title: "h2.job-title".to_string(),
            location: "span.job-location".to_string(),
            salary: "span.job-salary".to_string(),
            date_posted: "span.date-posted".to_string(),
            due_date: "span.due-date".to_string(),
            email: "a.email-address".to_string(),
            application_link: "a.application-link".to_string(),
        }
    }
}
