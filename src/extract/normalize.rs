//! Field-level normalizers applied to extracted values

use regex::Regex;
use std::sync::OnceLock;

/// Rewrites the first `DD/MM/YYYY` date found in `raw` as `YYYY-MM-DD`
///
/// Values without such a date are returned trimmed but otherwise untouched.
///
/// ```
/// use jobcrawl::extract::standardize_date;
///
/// assert_eq!(standardize_date("Posted 05/11/2024"), "2024-11-05");
/// assert_eq!(standardize_date(" next week "), "next week");
/// ```
pub fn standardize_date(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d{2})/(\d{2})/(\d{4})").unwrap());

    match re.captures(raw) {
        Some(caps) => format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]),
        None => raw.trim().to_string(),
    }
}

/// Syntactic email check; no DNS or deliverability test
pub fn is_valid_email(candidate: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[\w.+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$").unwrap()
    });
    re.is_match(candidate)
}
