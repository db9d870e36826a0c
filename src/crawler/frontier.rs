//! Shared crawl frontier
//!
//! The frontier owns the pending queue, the visited set and the in-flight
//! counter. Every URL is admitted at most once per run, and the crawl is
//! finished exactly when nothing is pending and nothing is in flight.

use crate::url::{normalize_url, resolve_url, same_host};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// Depth assigned to the seed URL
pub const SEED_DEPTH: u32 = 1;

/// A URL waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

#[derive(Debug)]
struct FrontierState {
    scope: Url,
    pending: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    in_flight: usize,
    dequeued: u64,
    discarded: u64,
}

/// Thread-safe work queue with dedup, depth ceiling and termination detection
#[derive(Debug)]
pub struct Frontier {
    max_depth: u32,
    state: Mutex<FrontierState>,
    changed: Notify,
    draining: AtomicBool,
}

impl Frontier {
    /// Creates an empty frontier scoped to the host of `base`
    ///
    /// # Arguments
    ///
    /// * `base` - Base URL; relative references resolve against it and only
    ///   its host and port are admitted
    /// * `max_depth` - Deepest level that may be enqueued
    pub fn new(base: Url, max_depth: u32) -> Self {
        Self {
            max_depth,
            state: Mutex::new(FrontierState {
                scope: base,
                pending: VecDeque::new(),
                visited: HashSet::new(),
                in_flight: 0,
                dequeued: 0,
                discarded: 0,
            }),
            changed: Notify::new(),
            draining: AtomicBool::new(false),
        }
    }

    /// URL whose host and port bound the crawl
    pub fn scope(&self) -> Url {
        self.lock().scope.clone()
    }

    /// Whether `url` is on the host and port being crawled
    pub fn in_scope(&self, url: &Url) -> bool {
        same_host(&self.lock().scope, url)
    }

    /// Moves the crawl scope to where the seed actually resolved
    ///
    /// Used when the seed redirects to another scheme, host or port. The
    /// resolved URL counts as visited so links back to it are not fetched
    /// a second time.
    pub fn rebase(&self, resolved: &Url) {
        let mut state = self.lock();
        if !same_host(&state.scope, resolved) {
            tracing::info!("Seed resolved to {}, crawling that site", resolved);
        }
        state.scope = resolved.clone();
        if let Ok(normalized) = normalize_url(resolved.as_str()) {
            state.visited.insert(normalized.as_str().to_string());
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Admits a URL unless it was seen before
    ///
    /// The check against the visited set and the insertion happen under one
    /// lock, so concurrent callers racing on the same URL admit it once.
    ///
    /// # Returns
    ///
    /// * `true` - The URL was newly admitted
    /// * `false` - Too deep, unparseable, off-host, already visited, or the
    ///   frontier is draining
    pub fn try_enqueue(&self, url: &str, depth: u32) -> bool {
        if depth > self.max_depth {
            tracing::trace!(url, depth, "Depth ceiling reached, not enqueuing");
            return false;
        }

        {
            let mut state = self.lock();
            let normalized = match resolve_url(&state.scope, url) {
                Ok(normalized) => normalized,
                Err(e) => {
                    tracing::debug!(url, error = %e, "Skipping unusable URL");
                    return false;
                }
            };

            if !same_host(&state.scope, &normalized) {
                tracing::trace!(url = %normalized, "Skipping off-host URL");
                return false;
            }
            if self.draining.load(Ordering::Acquire) {
                return false;
            }
            if !state.visited.insert(normalized.as_str().to_string()) {
                return false;
            }
            state.pending.push_back(FrontierEntry {
                url: normalized,
                depth,
            });
        }

        self.changed.notify_waiters();
        true
    }

    /// Takes the next entry, waiting while other workers may still add more
    ///
    /// Returns `None` once nothing is pending and nothing is in flight, or as
    /// soon as the frontier is draining. Every `Some` must be paired with one
    /// [`Frontier::mark_done`].
    pub async fn dequeue(&self) -> Option<FrontierEntry> {
        loop {
            // Register interest before inspecting state so a notification
            // sent between the check and the await is not lost.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if self.draining.load(Ordering::Acquire) {
                    return None;
                }
                if let Some(entry) = state.pending.pop_front() {
                    state.in_flight += 1;
                    state.dequeued += 1;
                    return Some(entry);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Records that a dequeued entry is fully processed
    pub fn mark_done(&self) {
        let finished = {
            let mut state = self.lock();
            if state.in_flight == 0 {
                tracing::warn!("mark_done called with nothing in flight");
                return;
            }
            state.in_flight -= 1;
            state.in_flight == 0 && state.pending.is_empty()
        };

        if finished {
            tracing::debug!("Frontier exhausted");
            self.changed.notify_waiters();
        }
    }

    /// Stops admitting and handing out work
    ///
    /// Pending entries are discarded; in-flight entries finish normally.
    ///
    /// # Returns
    ///
    /// The number of discarded pending entries
    pub fn drain(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            self.draining.store(true, Ordering::Release);
            let discarded = state.pending.len();
            state.pending.clear();
            state.discarded += discarded as u64;
            discarded
        };

        self.changed.notify_waiters();
        discarded
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn visited_len(&self) -> usize {
        self.lock().visited.len()
    }

    /// Total entries handed out since creation
    pub fn dequeued_total(&self) -> u64 {
        self.lock().dequeued
    }

    /// Total pending entries discarded by [`Frontier::drain`]
    pub fn discarded_total(&self) -> u64 {
        self.lock().discarded
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
