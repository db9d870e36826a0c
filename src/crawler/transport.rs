//! HTTP transport
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - Per-request timeouts
//! - Classifying failures as transient or permanent
//!
//! Transports answer one hop at a time. A redirect comes back as a 3xx page
//! carrying its `Location`, so the caller can vet every hop before it is
//! requested.
//!
//! The engine only depends on the [`Transport`] trait so tests can substitute
//! an in-memory link graph for the network.

use crate::config::CrawlerConfig;
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A response as seen by the crawl engine
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// URL that produced this response
    pub final_url: String,
    /// Page body content
    pub body: String,
    /// `Location` header of a redirect response
    pub location: Option<String>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    /// Target of a redirect response
    ///
    /// The path is kept exactly as the server sent it, since a normalized
    /// spelling may redirect straight back. Only the fragment is dropped.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Not a redirect
    /// * `Ok(Some(url))` - The hop to follow
    /// * `Err(TransportError::Redirect)` - The `Location` is unusable
    pub fn redirect_target(&self) -> Result<Option<Url>, TransportError> {
        let Some(location) = self.location.as_deref().filter(|_| self.is_redirect()) else {
            return Ok(None);
        };

        let from = Url::parse(&self.final_url)
            .map_err(|e| TransportError::Redirect(format!("{}: {}", self.final_url, e)))?;
        let mut target = from
            .join(location.trim())
            .map_err(|e| TransportError::Redirect(format!("{} -> {}: {}", from, location, e)))?;

        if !matches!(target.scheme(), "http" | "https") {
            return Err(TransportError::Redirect(format!(
                "{} -> unsupported scheme {}",
                from,
                target.scheme()
            )));
        }
        target.set_fragment(None);
        Ok(Some(target))
    }
}

/// Failures raised by a transport before a status code is available
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Bad redirect: {0}")]
    Redirect(String),

    #[error("Malformed response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Network and timeout class failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_) | Self::Request(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_redirect() {
            Self::Redirect(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Why a page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("Redirected to {url}, disallowed by robots.txt")]
    Disallowed { url: String },

    #[error("Redirected off site to {url}")]
    OffSite { url: String },
}

/// Fetches a single URL without following redirects
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the transport from crawler settings
    ///
    /// # Returns
    ///
    /// * `Ok(HttpTransport)` - Client built successfully
    /// * `Err(reqwest::Error)` - TLS backend or client initialization failed
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(FetchedPage {
            status,
            final_url,
            body,
            location,
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed by the client.
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
///
/// # Example
///
/// ```no_run
/// use jobcrawl::crawler::build_http_client;
///
/// let client = build_http_client("jobcrawl/1.0").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}
