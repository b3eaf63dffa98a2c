//! HTTP page fetching.
//!
//! One `reqwest::Client` per harvest session. Its cookie store keeps
//! whatever the index sets on one page for the following pages.

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use tracing::debug;
use url::Url;

/// Persistent HTTP session for result pages.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// Build the session from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an invalid proxy or if the client cannot be built.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .cookie_store(true);

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                HarvestError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// GET one page and return its raw body.
    ///
    /// No retries here; the harvest loop decides what a failure means.
    ///
    /// # Errors
    ///
    /// `RateLimited` on HTTP 429, `Api` on other non-success statuses,
    /// `Network` on transport errors.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(60);
            return Err(HarvestError::RateLimited(retry_after));
        }

        if !status.is_success() {
            return Err(HarvestError::Api {
                code: status.as_u16(),
                message: format!("HTTP error: {}", status),
            });
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}
