//! Paginated harvesting over result pages.
//!
//! A [`HarvestSession`] owns the HTTP session and the lazily started
//! browser. Open it, call [`search`](HarvestSession::search) as often as
//! needed, then [`close`](HarvestSession::close) it. [`HarvestSession::run`]
//! does all three and closes on every exit path.

use crate::block;
use crate::browser::{default_launcher, BrowserFallback, BrowserLauncher};
use crate::config::HarvestConfig;
use crate::control::{HarvestControl, HarvestState};
use crate::error::{HarvestError, Result};
use crate::fetcher::PageFetcher;
use crate::parser::ResultPageParser;
use crate::record::{current_year, ArticleRecord, SearchQuery};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Results per page served by the index.
pub const RESULTS_PER_PAGE: usize = 10;

/// Build the result page URL for one offset.
///
/// The upper year bound is left out when it is the current year, which is
/// what the index assumes anyway.
pub fn build_search_url(
    base_url: &str,
    query: &SearchQuery,
    start: usize,
    current_year: i32,
) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url.trim_end_matches('/')))
        .map_err(|e| HarvestError::Config(format!("Invalid base URL: {}", e)))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("start", &start.to_string());
        params.append_pair("q", &query.keyword);
        params.append_pair("hl", "en");
        params.append_pair("as_sdt", "0,5");
        if let Some(year) = query.start_year {
            params.append_pair("as_ylo", &year.to_string());
        }
        if let Some(year) = query.end_year.filter(|&y| y != current_year) {
            params.append_pair("as_yhi", &year.to_string());
        }
    }

    Ok(url)
}

/// What a single fetched page looks like to the harvester.
#[derive(Debug, Clone)]
pub struct PageProbe {
    /// Final URL requested
    pub url: Url,
    /// Size of the body in bytes
    pub bytes: usize,
    /// Robot check detected
    pub blocked: bool,
    /// Entry containers on the page
    pub entries: usize,
}

/// Scoped harvest session.
pub struct HarvestSession {
    config: HarvestConfig,
    fetcher: PageFetcher,
    fallback: BrowserFallback,
    control: HarvestControl,
}

impl HarvestSession {
    /// Open a session with the browser configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid or the HTTP session
    /// cannot be created.
    pub fn open(config: HarvestConfig) -> Result<Self> {
        let launcher = default_launcher(&config.browser);
        Self::with_launcher(config, launcher)
    }

    /// Open a session with an explicit browser launcher (`None` disables
    /// the fallback).
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn with_launcher(
        config: HarvestConfig,
        launcher: Option<Arc<dyn BrowserLauncher>>,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = PageFetcher::new(&config)?;
        let control = HarvestControl::new();
        let launcher = launcher.filter(|_| config.browser.enabled);
        let fallback = BrowserFallback::new(launcher, config.browser.clone(), control.clone());
        debug!(base_url = %config.base_url, "Harvest session opened");

        Ok(Self {
            config,
            fetcher,
            fallback,
            control,
        })
    }

    /// Open, search once, close.
    ///
    /// # Errors
    ///
    /// Returns session setup errors; the browser is closed either way.
    pub async fn run(config: HarvestConfig, query: &SearchQuery) -> Result<Vec<ArticleRecord>> {
        let mut session = Self::open(config)?;
        let result = session.search(query).await;
        session.close().await;
        result
    }

    /// Handle for watching state and cancelling waits.
    pub fn control(&self) -> HarvestControl {
        self.control.clone()
    }

    /// Harvest up to `query.num_results` records.
    ///
    /// Pages that fail to load, or stay blocked after the browser fallback,
    /// are skipped. A page without any entries ends the search. An empty
    /// result is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the search URL cannot be built.
    pub async fn search(&mut self, query: &SearchQuery) -> Result<Vec<ArticleRecord>> {
        let year = current_year();
        let parser = ResultPageParser::new(year)?;

        info!(
            query = %query.keyword,
            target = query.num_results,
            start_year = ?query.start_year,
            end_year = ?query.end_year,
            "Starting Google Scholar harvest"
        );

        let mut articles: Vec<ArticleRecord> = Vec::new();

        for (index, offset) in (0..query.num_results).step_by(RESULTS_PER_PAGE).enumerate() {
            if self.control.is_cancelled() {
                warn!(collected = articles.len(), "Harvest cancelled");
                break;
            }

            let page_num = index + 1;
            let url = build_search_url(&self.config.base_url, query, offset, year)?;
            debug!(page = page_num, url = %url, "Fetching page");
            self.control.set(HarvestState::Fetching { offset });

            let mut content = match self.fetcher.fetch(&url).await {
                Ok(content) => content,
                Err(e) => {
                    error!(page = page_num, error = %e, "Failed to fetch page");
                    continue;
                }
            };

            if block::is_blocked(&content) {
                warn!(page = page_num, "Robot check detected, trying browser");
                match self.fallback.fetch_via_browser(url.as_str()).await {
                    Some(body) => content = body,
                    None => {
                        warn!(page = page_num, "Browser fallback returned nothing, skipping page");
                        continue;
                    }
                }
            }

            let remaining = query.num_results - articles.len();
            let parsed = parser.parse_page(&content, remaining);
            info!(
                page = page_num,
                entries = parsed.entries,
                parsed = parsed.records.len(),
                "Parsed page"
            );

            if parsed.entries == 0 {
                warn!(page = page_num, "No entries found, end of results or blocked");
                if index == 0 {
                    self.dump_debug_html(&content);
                }
                break;
            }

            articles.extend(parsed.records);
            if articles.len() >= query.num_results {
                break;
            }

            if offset.saturating_add(RESULTS_PER_PAGE) < query.num_results {
                let wait = self.config.page_delay;
                self.control.set(HarvestState::Pausing { wait });
                if !self.control.wait(wait).await {
                    warn!(collected = articles.len(), "Harvest cancelled");
                    break;
                }
            }
        }

        info!(total = articles.len(), "Harvest complete");
        self.control.set(HarvestState::Finished {
            count: articles.len(),
        });
        Ok(articles)
    }

    /// Fetch a single URL and report how the harvester would see it.
    ///
    /// # Errors
    ///
    /// Returns fetch errors and URL parse errors.
    pub async fn probe(&self, url: &str) -> Result<PageProbe> {
        let url = Url::parse(url).map_err(|e| HarvestError::Validation(format!("Invalid URL: {}", e)))?;
        let content = self.fetcher.fetch(&url).await?;
        let parser = ResultPageParser::new(current_year())?;
        let entries = parser.parse_page(&content, 0).entries;

        Ok(PageProbe {
            blocked: block::is_blocked(&content),
            bytes: content.len(),
            entries,
            url,
        })
    }

    /// Release the browser and the HTTP session.
    pub async fn close(mut self) {
        self.fallback.shutdown().await;
        self.control.set(HarvestState::Idle);
        debug!("Harvest session closed");
    }

    fn dump_debug_html(&self, content: &[u8]) {
        let Some(path) = self.config.debug_html_path.as_deref() else {
            return;
        };
        if let Err(e) = std::fs::write(path, content) {
            warn!("Failed to write debug HTML: {}", e);
        } else {
            info!("Debug HTML saved to: {:?}", path);
        }
    }
}
