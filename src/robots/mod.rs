//! Robots.txt handling module
//!
//! This module fetches robots.txt once per origin per run and answers
//! allow/deny for every URL before it is fetched. Any failure to obtain a
//! usable document results in an allow-all policy.

mod parser;

pub use parser::{PolicySnapshot, PolicySource};

use crate::crawler::{FetchedPage, Transport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Redirect hops followed when fetching robots.txt
const POLICY_REDIRECT_LIMIT: usize = 5;

type PolicyCell = Arc<OnceCell<Arc<PolicySnapshot>>>;

/// Answers whether a URL may be fetched
///
/// A policy is fetched lazily on the first query for its origin. Concurrent
/// first callers wait on the same fetch; later reads only take the map lock
/// to find the cell.
pub struct PolitenessGate {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    policies: Mutex<HashMap<String, PolicyCell>>,
}

impl PolitenessGate {
    /// Creates a gate with no policy loaded yet
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport used for the robots.txt requests
    /// * `timeout` - Upper bound on obtaining one policy, redirects included
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            policies: Mutex::new(HashMap::new()),
        }
    }

    /// Checks if a URL is allowed by the robots.txt of its origin
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.snapshot(url).await.is_allowed(url)
    }

    /// Returns the policy for the origin of `url`, fetching it on first use
    pub async fn snapshot(&self, url: &Url) -> Arc<PolicySnapshot> {
        let origin = url.origin().ascii_serialization();
        let cell = {
            let mut policies = self.policies.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(policies.entry(origin).or_default())
        };

        let snapshot = cell.get_or_init(|| self.load_policy(url)).await;
        Arc::clone(snapshot)
    }

    async fn load_policy(&self, url: &Url) -> Arc<PolicySnapshot> {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return Arc::new(PolicySnapshot::allow_all());
        };

        let fetched = tokio::time::timeout(self.timeout, self.fetch_document(&robots_url)).await;
        let snapshot = match fetched {
            Ok(Ok(page)) if page.is_success() => PolicySnapshot::parse(&page.body),
            Ok(Ok(page)) => {
                tracing::info!(
                    url = %robots_url,
                    status = page.status,
                    "No usable robots.txt, allowing all"
                );
                PolicySnapshot::allow_all()
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    url = %robots_url,
                    error = %e,
                    "Failed to fetch robots.txt, allowing all"
                );
                PolicySnapshot::allow_all()
            }
            Err(_) => {
                tracing::warn!(
                    url = %robots_url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out fetching robots.txt, allowing all"
                );
                PolicySnapshot::allow_all()
            }
        };

        tracing::debug!(
            url = %robots_url,
            source = ?snapshot.source(),
            disallowed = snapshot.disallowed_prefixes().len(),
            "Politeness policy loaded"
        );
        Arc::new(snapshot)
    }

    async fn fetch_document(&self, robots_url: &Url) -> Result<FetchedPage, TransportError> {
        let mut target = robots_url.clone();
        for _ in 0..POLICY_REDIRECT_LIMIT {
            let page = self.transport.fetch(&target, self.timeout).await?;
            match page.redirect_target()? {
                Some(next) => target = next,
                None => return Ok(page),
            }
        }
        Err(TransportError::Redirect(format!(
            "more than {} redirects from {}",
            POLICY_REDIRECT_LIMIT, robots_url
        )))
    }
}
