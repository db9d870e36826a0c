//! Page extraction boundary
//!
//! The crawl engine hands every fetched page body to a [`PageExtractor`] and
//! gets back the job records found on the page plus its outbound links. Which
//! markup maps to which record field is site-specific, so the engine only
//! depends on the trait; [`JobListingExtractor`] is the CSS selector driven
//! implementation used by the binary.

mod html;
mod normalize;

pub use html::JobListingExtractor;
pub use normalize::{is_valid_email, standardize_date};

use thiserror::Error;
use url::Url;

/// A job listing extracted from a page
///
/// Every field is a plain string; a missing value is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRecord {
    pub title: String,
    pub location: String,
    pub salary: String,
    pub date_posted: String,
    pub due_date: String,
    pub email: String,
    pub application_link: String,
    /// Page the record was extracted from
    pub source_url: String,
}

impl JobRecord {
    /// Returns true if the fields the sink requires are present
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.application_link.trim().is_empty()
    }
}

/// Everything extracted from a single page
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub records: Vec<JobRecord>,
    /// Outbound links as written in the page; may be relative
    pub links: Vec<String>,
}

/// Errors that can occur while extracting a page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Malformed page content: {0}")]
    Malformed(String),
}

/// Turns a page body into records and outbound links
pub trait PageExtractor: Send + Sync {
    fn extract(&self, body: &str, page_url: &Url) -> Result<ExtractedPage, ExtractError>;
}
