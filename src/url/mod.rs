//! URL handling module for jobcrawl
//!
//! Normalization gives every discovered link a single canonical spelling, which
//! is what the frontier deduplicates on.

mod normalize;

use url::Url;

pub use normalize::{normalize_url, resolve_url};

/// Returns true if both URLs point at the same host and port
///
/// # Examples
///
/// ```
/// use jobcrawl::url::same_host;
/// use url::Url;
///
/// let a = Url::parse("https://example.com/a").unwrap();
/// let b = Url::parse("https://example.com/b?x=1").unwrap();
/// let c = Url::parse("https://example.com:8443/a").unwrap();
/// assert!(same_host(&a, &b));
/// assert!(!same_host(&a, &c));
/// ```
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
