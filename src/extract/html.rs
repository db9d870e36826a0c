//! CSS selector driven job listing extractor
//!
//! This module handles parsing HTML content to extract:
//! - Job listings (one record per listing element)
//! - Links to follow (from <a> tags and canonical links)

use crate::config::ExtractorConfig;
use crate::extract::normalize::{is_valid_email, standardize_date};
use crate::extract::{ExtractError, ExtractedPage, JobRecord, PageExtractor};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Link schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Extracts job listings using the selectors from [`ExtractorConfig`]
///
/// Selectors are compiled once at construction and shared by every worker.
#[derive(Debug)]
pub struct JobListingExtractor {
    listing: Selector,
    title: Selector,
    location: Selector,
    salary: Selector,
    date_posted: Selector,
    due_date: Selector,
    email: Selector,
    application_link: Selector,
    anchor: Selector,
    canonical: Selector,
}

impl JobListingExtractor {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(JobListingExtractor)` - All selectors compiled
    /// * `Err(ConfigError)` - A selector is not valid CSS
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            listing: compile("listing", &config.listing)?,
            title: compile("title", &config.title)?,
            location: compile("location", &config.location)?,
            salary: compile("salary", &config.salary)?,
            date_posted: compile("date-posted", &config.date_posted)?,
            due_date: compile("due-date", &config.due_date)?,
            email: compile("email", &config.email)?,
            application_link: compile("application-link", &config.application_link)?,
            anchor: compile("anchor", "a[href]")?,
            canonical: compile("canonical", "link[rel='canonical'][href]")?,
        })
    }

    fn extract_record(&self, listing: ElementRef<'_>, page_url: &Url) -> JobRecord {
        let email = first_match(listing, &self.email)
            .map(|el| {
                let text = element_text(el);
                if text.is_empty() {
                    el.value()
                        .attr("href")
                        .map(|href| href.trim().trim_start_matches("mailto:").to_string())
                        .unwrap_or_default()
                } else {
                    text
                }
            })
            .filter(|candidate| is_valid_email(candidate))
            .unwrap_or_default();

        let application_link = first_match(listing, &self.application_link)
            .map(|el| {
                let raw = el
                    .value()
                    .attr("href")
                    .map(str::trim)
                    .filter(|href| !href.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(el));
                absolutize(&raw, page_url)
            })
            .unwrap_or_default();

        JobRecord {
            title: self.field_text(listing, &self.title),
            location: self.field_text(listing, &self.location),
            salary: self.field_text(listing, &self.salary),
            date_posted: standardize_date(&self.field_text(listing, &self.date_posted)),
            due_date: standardize_date(&self.field_text(listing, &self.due_date)),
            email,
            application_link,
            source_url: page_url.to_string(),
        }
    }

    fn field_text(&self, listing: ElementRef<'_>, selector: &Selector) -> String {
        first_match(listing, selector)
            .map(element_text)
            .unwrap_or_default()
    }

    /// Collects followable hrefs exactly as written in the document
    fn extract_links(&self, document: &Html) -> Vec<String> {
        let anchors = document
            .select(&self.anchor)
            .filter(|el| el.value().attr("download").is_none());
        let canonical = document.select(&self.canonical);

        anchors
            .chain(canonical)
            .filter_map(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| is_followable(href))
            .map(str::to_string)
            .collect()
    }
}

impl PageExtractor for JobListingExtractor {
    fn extract(&self, body: &str, page_url: &Url) -> Result<ExtractedPage, ExtractError> {
        if body.contains('\0') {
            return Err(ExtractError::Malformed(format!(
                "{} looks like binary content",
                page_url
            )));
        }

        let document = Html::parse_document(body);

        let records = document
            .select(&self.listing)
            .map(|listing| self.extract_record(listing, page_url))
            .collect();

        let links = self.extract_links(&document);

        Ok(ExtractedPage { records, links })
    }
}

fn compile(field: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field,
        selector: selector.to_string(),
    })
}

fn first_match<'a>(scope: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).next()
}

/// Element text with runs of whitespace collapsed to single spaces
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolutize(raw: &str, page_url: &Url) -> String {
    if raw.is_empty() {
        return String::new();
    }
    page_url
        .join(raw)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn is_followable(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    let lower = href.to_ascii_lowercase();
    !SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}
