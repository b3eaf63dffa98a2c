//! Browser fallback for robot-check pages.
//!
//! When the plain HTTP session is served an interstitial, the page is loaded
//! again in a real, visible Chromium window. If the browser sees the same
//! challenge, the run pauses so a human can solve it, then reloads once.
//!
//! Browser automation is a capability that may be missing at runtime (the
//! `browser` feature is off, no Chrome is installed, or launching fails).
//! In every such case the fallback yields no content instead of failing.

use crate::block;
use crate::config::BrowserSettings;
use crate::control::{HarvestControl, HarvestState};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// XPath of the element whose content is returned.
pub const BODY_XPATH: &str = "/html/body";

/// One running browser window.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Load `url` in the window.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Locate the element at `xpath` and read its inner HTML.
    ///
    /// `Ok(None)` means the element is not (yet) present.
    async fn read_element(&mut self, xpath: &str) -> Result<Option<String>>;

    /// Shut the browser down.
    async fn close(&mut self) -> Result<()>;
}

/// Starts browser windows on demand.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Whether a browser can be launched on this machine.
    fn is_available(&self) -> bool;

    /// Start a new browser.
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>>;
}

/// Lazily started browser session owned by one harvest session.
pub struct BrowserFallback {
    launcher: Option<Arc<dyn BrowserLauncher>>,
    driver: Option<Box<dyn BrowserDriver>>,
    launch_failed: bool,
    settings: BrowserSettings,
    control: HarvestControl,
}

impl BrowserFallback {
    /// Create a fallback; `None` launcher disables it.
    pub fn new(
        launcher: Option<Arc<dyn BrowserLauncher>>,
        settings: BrowserSettings,
        control: HarvestControl,
    ) -> Self {
        Self {
            launcher,
            driver: None,
            launch_failed: false,
            settings,
            control,
        }
    }

    /// Whether a browser window is currently open.
    pub fn is_running(&self) -> bool {
        self.driver.is_some()
    }

    /// Load `url` through the browser and return the body content.
    ///
    /// Returns `None` when the browser is unavailable, the body never
    /// appears, a driver call fails, or the wait is cancelled.
    pub async fn fetch_via_browser(&mut self, url: &str) -> Option<Vec<u8>> {
        let settings = self.settings.clone();
        let control = self.control.clone();
        let driver = self.ensure_driver().await?;

        control.set(HarvestState::BrowserFallback {
            url: url.to_string(),
        });
        info!(url = %url, "Opening URL in browser");

        match load_body(driver, url, &settings, &control).await {
            Ok(content) => content.map(String::into_bytes),
            Err(e) => {
                error!(url = %url, error = %e, "Browser fallback failed");
                None
            }
        }
    }

    /// Close the browser if one was started.
    pub async fn shutdown(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.close().await {
                warn!(error = %e, "Failed to close browser cleanly");
            } else {
                debug!("Browser closed");
            }
        }
    }

    async fn ensure_driver(&mut self) -> Option<&mut (dyn BrowserDriver + 'static)> {
        if self.driver.is_none() {
            if self.launch_failed {
                return None;
            }
            let Some(launcher) = self.launcher.as_ref() else {
                warn!("Browser fallback disabled");
                return None;
            };
            if !launcher.is_available() {
                warn!("Browser automation not available on this machine");
                self.launch_failed = true;
                return None;
            }
            match launcher.launch().await {
                Ok(driver) => {
                    info!("Browser started");
                    self.driver = Some(driver);
                }
                Err(e) => {
                    error!(error = %e, "Failed to launch browser");
                    self.launch_failed = true;
                    return None;
                }
            }
        }
        self.driver.as_deref_mut()
    }
}

async fn load_body(
    driver: &mut dyn BrowserDriver,
    url: &str,
    settings: &BrowserSettings,
    control: &HarvestControl,
) -> Result<Option<String>> {
    driver.navigate(url).await?;
    let Some(mut content) = locate_element(driver, BODY_XPATH, settings, control).await else {
        return Ok(None);
    };

    if block::is_blocked(content.as_bytes()) {
        warn!(
            url = %url,
            wait_secs = settings.human_assist_wait.as_secs(),
            "CAPTCHA in browser window, waiting for manual solve"
        );
        control.set(HarvestState::AwaitingHuman {
            url: url.to_string(),
            wait: settings.human_assist_wait,
        });
        if !control.wait(settings.human_assist_wait).await {
            return Ok(None);
        }

        driver.navigate(url).await?;
        if let Some(body) = locate_element(driver, BODY_XPATH, settings, control).await {
            content = body;
        }
    }

    Ok(Some(content))
}

/// Look up an element with a bounded number of attempts.
///
/// Lookup errors count as misses.
pub async fn locate_element(
    driver: &mut dyn BrowserDriver,
    xpath: &str,
    settings: &BrowserSettings,
    control: &HarvestControl,
) -> Option<String> {
    let attempts = settings.element_attempts.max(1);
    for attempt in 1..=attempts {
        match driver.read_element(xpath).await {
            Ok(Some(content)) => return Some(content),
            Ok(None) => debug!(xpath, attempt, "Element not found yet"),
            Err(e) => debug!(xpath, attempt, error = %e, "Element lookup failed"),
        }
        if attempt < attempts && !control.wait(settings.element_retry_pause).await {
            return None;
        }
    }
    warn!(xpath, attempts, "Element not found");
    None
}

/// Launcher for the configured browser settings, if any.
pub fn default_launcher(settings: &BrowserSettings) -> Option<Arc<dyn BrowserLauncher>> {
    if !settings.enabled {
        return None;
    }
    #[cfg(feature = "browser")]
    {
        Some(Arc::new(chromium::ChromiumLauncher::new(settings.clone())))
    }
    #[cfg(not(feature = "browser"))]
    {
        debug!("Built without the `browser` feature");
        None
    }
}

#[cfg(feature = "browser")]
pub mod chromium {
    //! Chromium implementation over the DevTools protocol.

    use super::{BrowserDriver, BrowserLauncher};
    use crate::config::BrowserSettings;
    use crate::error::{HarvestError, Result};
    use async_trait::async_trait;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use std::path::{Path, PathBuf};
    use tokio::task::JoinHandle;
    use tracing::{debug, info};

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    ];

    fn browser_error(context: &str, e: impl std::fmt::Display) -> HarvestError {
        HarvestError::Browser(format!("{}: {}", context, e))
    }

    /// Launches a local Chrome/Chromium.
    pub struct ChromiumLauncher {
        settings: BrowserSettings,
    }

    impl ChromiumLauncher {
        /// Create a launcher for these settings.
        pub fn new(settings: BrowserSettings) -> Self {
            Self { settings }
        }

        /// Configured executable, or the first known install location.
        pub fn find_executable(&self) -> Option<PathBuf> {
            if let Some(path) = &self.settings.executable {
                return path.exists().then(|| path.clone());
            }
            CHROME_PATHS
                .iter()
                .map(Path::new)
                .find(|p| p.exists())
                .map(Path::to_path_buf)
        }
    }

    #[async_trait]
    impl BrowserLauncher for ChromiumLauncher {
        fn is_available(&self) -> bool {
            self.find_executable().is_some()
        }

        async fn launch(&self) -> Result<Box<dyn BrowserDriver>> {
            let executable = self
                .find_executable()
                .ok_or_else(|| HarvestError::Browser("Chrome/Chromium not found".to_string()))?;
            info!(path = %executable.display(), headless = self.settings.headless, "Launching browser");

            let mut builder = BrowserConfig::builder()
                .chrome_executable(executable)
                .arg("--disable-infobars")
                .arg("--no-sandbox")
                .arg("--disable-dev-shm-usage");
            // `with_head` means a visible window
            if !self.settings.headless {
                builder = builder.with_head();
            }
            let config = builder
                .build()
                .map_err(|e| browser_error("Failed to build browser config", e))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| browser_error("Failed to launch browser", e))?;

            let events = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| browser_error("Failed to create page", e))?;

            Ok(Box::new(ChromiumDriver {
                browser,
                page,
                events,
            }))
        }
    }

    /// A launched Chromium with a single tab.
    ///
    /// Dropping it kills the child process even without `close`.
    pub struct ChromiumDriver {
        browser: Browser,
        page: Page,
        events: JoinHandle<()>,
    }

    #[async_trait]
    impl BrowserDriver for ChromiumDriver {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.page
                .goto(url)
                .await
                .map_err(|e| browser_error(&format!("Navigation to {} failed", url), e))?;
            Ok(())
        }

        async fn read_element(&mut self, xpath: &str) -> Result<Option<String>> {
            let element = match self.page.find_xpath(xpath).await {
                Ok(element) => element,
                Err(e) => {
                    debug!(xpath, error = %e, "XPath lookup missed");
                    return Ok(None);
                }
            };
            element
                .inner_html()
                .await
                .map_err(|e| browser_error("Failed to read element", e))
        }

        async fn close(&mut self) -> Result<()> {
            let closed = self
                .browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| browser_error("Failed to close browser", e));
            // Reap the child so no zombie is left behind.
            let _ = self.browser.wait().await;
            self.events.abort();
            closed
        }
    }

}
