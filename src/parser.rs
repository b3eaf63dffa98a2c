//! Result page parsing.

use crate::error::{HarvestError, Result};
use crate::extract::FieldExtractor;
use crate::record::ArticleRecord;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// CSS selector of one citation entry container.
pub const ENTRY_SELECTOR: &str = "div.gs_or";

/// Outcome of parsing one page.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Entry containers found, valid or not
    pub entries: usize,
    /// Records that passed the discard rules, in document order
    pub records: Vec<ArticleRecord>,
}

/// Locates entries on a page and extracts their records.
#[derive(Debug, Clone)]
pub struct ResultPageParser {
    entry: Selector,
    extractor: FieldExtractor,
}

impl ResultPageParser {
    /// Create a parser measuring citation age against `current_year`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if a selector fails to compile.
    pub fn new(current_year: i32) -> Result<Self> {
        Ok(Self {
            entry: Selector::parse(ENTRY_SELECTOR).map_err(|e| HarvestError::Parse(e.to_string()))?,
            extractor: FieldExtractor::new(current_year)?,
        })
    }

    /// All entry containers, top to bottom.
    pub fn find_entries<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&self.entry).collect()
    }

    /// Parse raw page bytes and extract at most `limit` records.
    ///
    /// Bytes are decoded lossily; markup drift degrades to fewer records.
    pub fn parse_page(&self, page: &[u8], limit: usize) -> ParsedPage {
        let html = String::from_utf8_lossy(page);
        let document = Html::parse_document(&html);
        let entries = self.find_entries(&document);

        let mut records = Vec::new();
        for node in &entries {
            if records.len() >= limit {
                break;
            }
            match self.extractor.extract(*node) {
                Some(record) => {
                    debug!(title = %record.title, citations = record.citations, "Parsed entry");
                    records.push(record);
                }
                None => debug!("Skipped entry without usable title"),
            }
        }

        ParsedPage {
            entries: entries.len(),
            records,
        }
    }
}
