//! Query input and normalized article output.

use crate::error::{HarvestError, Result};
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

/// Title value that marks a failed title scrape; such records are dropped.
pub const TITLE_SENTINEL: &str = "Could not catch title";
/// Author placeholder when the entry has no metadata line.
pub const AUTHOR_NOT_FOUND: &str = "Author not found";
/// Venue placeholder.
pub const VENUE_NOT_FOUND: &str = "Venue not found";
/// Publisher placeholder.
pub const PUBLISHER_NOT_FOUND: &str = "Publisher not found";

/// Largest accepted `num_results`.
pub const MAX_RESULTS: usize = 1000;
/// Longest accepted keyword, in characters.
pub const MAX_KEYWORD_CHARS: usize = 200;
/// Earliest accepted year bound.
pub const MIN_YEAR: i32 = 1900;

/// One harvest request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search keywords
    pub keyword: String,
    /// Target number of records
    pub num_results: usize,
    /// Lower publication year bound (inclusive)
    pub start_year: Option<i32>,
    /// Upper publication year bound (inclusive)
    pub end_year: Option<i32>,
}

impl SearchQuery {
    /// Build a validated query.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank or overlong keyword, a target outside
    /// `1..=MAX_RESULTS`, a year bound outside `MIN_YEAR..=current_year()` or
    /// an inverted year range.
    pub fn new(
        keyword: impl Into<String>,
        num_results: usize,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> Result<Self> {
        let keyword = keyword.into();
        if keyword.trim().is_empty() {
            return Err(HarvestError::Validation("keyword must not be empty".to_string()));
        }
        if keyword.chars().count() > MAX_KEYWORD_CHARS {
            return Err(HarvestError::Validation(format!(
                "keyword must be at most {} characters",
                MAX_KEYWORD_CHARS
            )));
        }
        if num_results == 0 || num_results > MAX_RESULTS {
            return Err(HarvestError::Validation(format!(
                "num_results must be between 1 and {}",
                MAX_RESULTS
            )));
        }
        let now = current_year();
        for year in [start_year, end_year].into_iter().flatten() {
            if !(MIN_YEAR..=now).contains(&year) {
                return Err(HarvestError::Validation(format!(
                    "year {} is outside {}..={}",
                    year, MIN_YEAR, now
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (start_year, end_year) {
            if lo > hi {
                return Err(HarvestError::Validation(format!(
                    "start_year {} is after end_year {}",
                    lo, hi
                )));
            }
        }
        Ok(Self {
            keyword,
            num_results,
            start_year,
            end_year,
        })
    }
}

/// A single normalized result entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Article title
    pub title: String,
    /// Raw author string
    pub authors: String,
    /// Journal/Conference venue
    pub venue: String,
    /// Publisher or hosting domain
    pub publisher: String,
    /// Publication year
    pub year: Option<i32>,
    /// Number of citations
    pub citations: u32,
    /// Citations normalized by years since publication
    pub citations_per_year: f64,
    /// Text snippet
    pub description: Option<String>,
    /// Link to the article
    pub url: Option<String>,
}

/// Current calendar year in local time.
pub fn current_year() -> i32 {
    Local::now().year()
}

/// Citations per elapsed year, rounded to two decimals.
///
/// Zero when the year is unknown or there are no citations; at least one
/// year is always assumed to have elapsed.
pub fn citations_per_year(citations: u32, year: Option<i32>, current_year: i32) -> f64 {
    match year {
        Some(year) if citations > 0 => {
            let years_passed = (current_year - year).max(1);
            let ratio = f64::from(citations) / f64::from(years_passed);
            (ratio * 100.0).round() / 100.0
        }
        _ => 0.0,
    }
}
