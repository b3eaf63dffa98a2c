//! Field extraction from one result entry.
//!
//! The metadata line (`div.gs_a`) looks like
//! `"AB Cole, CD Dale - Journal of X, 2019 - Springer"`. Author, year,
//! venue and publisher are cut out of it by hyphen and comma positions.
//! These heuristics are fragile by nature and are kept stable on purpose;
//! the fixture tests below pin their exact output.

use crate::error::{HarvestError, Result};
use crate::record::{
    citations_per_year, ArticleRecord, AUTHOR_NOT_FOUND, PUBLISHER_NOT_FOUND, TITLE_SENTINEL,
    VENUE_NOT_FOUND,
};
use scraper::{ElementRef, Selector};

/// Marker preceding the citation count in entry markup.
pub const CITED_BY_MARKER: &str = "Cited by ";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Parse(e.to_string()))
}

/// Turns entry nodes into records.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    heading: Selector,
    link: Selector,
    meta: Selector,
    snippet: Selector,
    current_year: i32,
}

impl FieldExtractor {
    /// Create an extractor that measures citation age against `current_year`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if a selector fails to compile.
    pub fn new(current_year: i32) -> Result<Self> {
        Ok(Self {
            heading: selector("h3")?,
            link: selector("a")?,
            meta: selector("div.gs_a")?,
            snippet: selector("div.gs_rs")?,
            current_year,
        })
    }

    /// Extract a record from one entry node.
    ///
    /// Returns `None` when the entry has no heading or its title is empty or
    /// the failure sentinel. A link without an `href`, or with an empty one,
    /// yields `url: None` rather than an empty string.
    pub fn extract(&self, node: ElementRef<'_>) -> Option<ArticleRecord> {
        let heading = node.select(&self.heading).next()?;
        let (title, url) = match heading.select(&self.link).next() {
            Some(link) => (
                element_text(link).trim().to_string(),
                link.value()
                    .attr("href")
                    .filter(|href| !href.is_empty())
                    .map(str::to_string),
            ),
            None => (element_text(heading).trim().to_string(), None),
        };
        if title.is_empty() || title == TITLE_SENTINEL {
            return None;
        }

        let citations = citations_from_markup(&node.html());

        let (authors, year, venue, publisher) = match node.select(&self.meta).next() {
            Some(meta) => {
                let text = element_text(meta);
                let (publisher, venue) = publisher_and_venue(&text);
                (author_from_meta(&text), year_from_meta(&text), venue, publisher)
            }
            None => (
                AUTHOR_NOT_FOUND.to_string(),
                None,
                VENUE_NOT_FOUND.to_string(),
                PUBLISHER_NOT_FOUND.to_string(),
            ),
        };

        let description = node
            .select(&self.snippet)
            .next()
            .map(|snippet| element_text(snippet).trim().to_string());

        Some(ArticleRecord {
            title,
            authors,
            venue,
            publisher,
            year,
            citations,
            citations_per_year: citations_per_year(citations, year, self.current_year),
            description,
            url,
        })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Citation count following `"Cited by "` in raw markup, up to the next tag.
///
/// Zero when the marker is missing or the count does not parse.
pub fn citations_from_markup(markup: &str) -> u32 {
    let Some(start) = markup.find(CITED_BY_MARKER) else {
        return 0;
    };
    let rest = &markup[start + CITED_BY_MARKER.len()..];
    let end = rest.find('<').unwrap_or(rest.len());
    rest[..end].trim().parse().unwrap_or(0)
}

/// Publication year from the metadata line.
///
/// For each hyphen, the four characters ending one before it (skipping the
/// space in `"2019 - "`) are tried as a year. The first all-digit window wins.
/// Hyphens before char index 5 have no full window and are skipped instead of
/// wrapping around to the end of the line.
pub fn year_from_meta(meta: &str) -> Option<i32> {
    let chars: Vec<char> = meta.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| c == '-' && i >= 5)
        .find_map(|(i, _)| {
            let window = &chars[i - 5..i - 1];
            if window.iter().all(char::is_ascii_digit) {
                window.iter().collect::<String>().parse().ok()
            } else {
                None
            }
        })
        .filter(|&year| year > 0)
}

/// Author string: characters from index 2 up to one before the first hyphen.
///
/// The whole line is returned when there is no hyphen past index 2.
pub fn author_from_meta(meta: &str) -> String {
    let chars: Vec<char> = meta.chars().collect();
    match chars.iter().position(|&c| c == '-') {
        Some(hyphen) if hyphen > 2 => chars[2..hyphen - 1].iter().collect(),
        _ => meta.to_string(),
    }
}

/// `(publisher, venue)` from the hyphen-separated metadata segments.
///
/// Publisher is the last segment. Venue is the segment before it minus its
/// last comma-separated part (usually the year), and needs at least three
/// segments.
pub fn publisher_and_venue(meta: &str) -> (String, String) {
    let parts: Vec<&str> = meta.split('-').collect();
    if parts.len() < 2 {
        return (PUBLISHER_NOT_FOUND.to_string(), VENUE_NOT_FOUND.to_string());
    }

    let publisher = parts[parts.len() - 1].trim().to_string();
    let venue = if parts.len() > 2 {
        let components: Vec<&str> = parts[parts.len() - 2].split(',').collect();
        components[..components.len() - 1].join(" ").trim().to_string()
    } else {
        VENUE_NOT_FOUND.to_string()
    };
    (publisher, venue)
}
