//! Harvester configuration.

use crate::error::{HarvestError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default values.
pub mod defaults {
    use std::time::Duration;

    /// Default Google Scholar URL
    pub const BASE_URL: &str = "https://scholar.google.com";

    /// User agent string for requests
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

    /// Request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Pause between result pages.
    pub const PAGE_DELAY: Duration = Duration::from_millis(500);

    /// Attempts to locate an element in the browser.
    pub const ELEMENT_ATTEMPTS: u32 = 5;

    /// Pause between element lookups.
    pub const ELEMENT_RETRY_PAUSE: Duration = Duration::from_secs(1);

    /// Time given to a human to clear a CAPTCHA in the visible browser.
    pub const HUMAN_ASSIST_WAIT: Duration = Duration::from_secs(30);
}

/// Prefix of environment variables read by [`HarvestConfig::from_env`].
pub const ENV_PREFIX: &str = "SCHOLARDOCK_";

/// Browser fallback settings.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Whether the fallback may be used at all
    pub enabled: bool,
    /// Headless mode; visible by default so a human can solve challenges
    pub headless: bool,
    /// Chrome/Chromium executable override
    pub executable: Option<PathBuf>,
    /// Element lookup attempts
    pub element_attempts: u32,
    /// Pause between element lookups
    pub element_retry_pause: Duration,
    /// Human-assist wait when the browser also sees a robot check
    pub human_assist_wait: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: false,
            executable: None,
            element_attempts: defaults::ELEMENT_ATTEMPTS,
            element_retry_pause: defaults::ELEMENT_RETRY_PAUSE,
            human_assist_wait: defaults::HUMAN_ASSIST_WAIT,
        }
    }
}

/// Harvest session configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Index base URL (mirror sites allowed)
    pub base_url: String,
    /// User agent for the HTTP session
    pub user_agent: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Pause between result pages
    pub page_delay: Duration,
    /// Browser fallback
    pub browser: BrowserSettings,
    /// Where to dump the first page when it has no entries
    pub debug_html_path: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout: defaults::REQUEST_TIMEOUT,
            proxy: None,
            page_delay: defaults::PAGE_DELAY,
            browser: BrowserSettings::default(),
            debug_html_path: None,
        }
    }
}

impl HarvestConfig {
    /// Configuration for mock servers: no delays, no browser.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(5),
            page_delay: Duration::ZERO,
            browser: BrowserSettings {
                enabled: false,
                element_retry_pause: Duration::ZERO,
                human_assist_wait: Duration::ZERO,
                ..BrowserSettings::default()
            },
            ..Self::default()
        }
    }

    /// Create configuration from `SCHOLARDOCK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Keys are given without the [`ENV_PREFIX`]; unset keys keep defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let mut config = Self::default();
        if let Some(base_url) = get("BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(user_agent) = get("USER_AGENT") {
            config.user_agent = user_agent;
        }
        config.proxy = get("PROXY");
        if let Some(secs) = parse_value::<u64>("TIMEOUT_SECS", get("TIMEOUT_SECS"))? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_value::<u64>("PAGE_DELAY_MS", get("PAGE_DELAY_MS"))? {
            config.page_delay = Duration::from_millis(ms);
        }
        if let Some(enabled) = parse_flag("USE_BROWSER", get("USE_BROWSER"))? {
            config.browser.enabled = enabled;
        }
        if let Some(headless) = parse_flag("HEADLESS", get("HEADLESS"))? {
            config.browser.headless = headless;
        }
        config.browser.executable = get("BROWSER_PATH").map(PathBuf::from);
        if let Some(secs) = parse_value::<u64>("HUMAN_WAIT_SECS", get("HUMAN_WAIT_SECS"))? {
            config.browser.human_assist_wait = Duration::from_secs(secs);
        }
        config.debug_html_path = get("DEBUG_HTML").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail mid-run.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(HarvestError::Config("base URL must not be empty".to_string()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| HarvestError::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy)
                .map_err(|e| HarvestError::Config(format!("Invalid proxy URL '{}': {}", proxy, e)))?;
        }
        if self.browser.element_attempts == 0 {
            return Err(HarvestError::Config(
                "browser element attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|e| {
            HarvestError::Config(format!("{}{}='{}': {}", ENV_PREFIX, name, value, e))
        })
    })
    .transpose()
}

fn parse_flag(name: &str, raw: Option<String>) -> Result<Option<bool>> {
    raw.map(|value| match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HarvestError::Config(format!(
            "{}{}='{}' is not a boolean",
            ENV_PREFIX, name, other
        ))),
    })
    .transpose()
}
