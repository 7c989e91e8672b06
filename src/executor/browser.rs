//! Chrome DevTools Protocol browser control.
//!
//! The browser is launched lazily on first use and kept behind a single
//! guarded slot, so concurrent callers share one instance and a second
//! launch can never race the first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{AssistantError, Result};

/// Browser actions the executor depends on.
#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// Navigate the active tab to a URL, opening the browser if needed.
    async fn navigate(&self, url: &str) -> Result<String>;

    /// Click the first element matching a CSS selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Focus an element and type text into it.
    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;

    /// Tear down the browser if it was launched.
    async fn close(&self);
}

/// Lazily-launched Chromium instance driven over CDP.
pub struct ChromiumBrowser {
    browser: Arc<Mutex<Option<Browser>>>,
    config: BrowserConfig,
}

impl ChromiumBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Launch the browser into the slot if it is still empty. Callers
    /// must hold the slot lock, which is what makes the launch
    /// single-flight.
    async fn ensure_launched<'a>(
        &self,
        guard: &'a mut Option<Browser>,
    ) -> Result<&'a mut Browser> {
        if guard.is_none() {
            let mut builder = CdpConfig::builder().launch_timeout(Duration::from_secs(
                self.config.nav_timeout_s,
            ));
            if !self.config.headless {
                builder = builder.with_head();
            }
            if let Some(ref chrome_path) = self.config.chrome_path {
                builder = builder.chrome_executable(chrome_path);
            }
            let cdp_config = builder
                .build()
                .map_err(|e| AssistantError::Browser(format!("config error: {e}")))?;

            let (browser, mut handler) = Browser::launch(cdp_config)
                .await
                .map_err(|e| AssistantError::Browser(format!("launch failed: {e}")))?;

            tokio::spawn(async move {
                while handler.next().await.is_some() {}
                debug!("browser handler exited");
            });

            info!(headless = self.config.headless, "browser launched");
            *guard = Some(browser);
        }
        // Guarded by the check above.
        guard
            .as_mut()
            .ok_or_else(|| AssistantError::Browser("browser slot empty".into()))
    }

    /// The most recently used page, if any tab is open.
    async fn active_page(&self, browser: &Browser) -> Result<Page> {
        let pages = browser
            .pages()
            .await
            .map_err(|e| AssistantError::Browser(format!("page listing failed: {e}")))?;
        pages
            .into_iter()
            .next_back()
            .ok_or_else(|| AssistantError::Browser("no open page".into()))
    }
}

#[async_trait]
impl BrowserControl for ChromiumBrowser {
    async fn navigate(&self, url: &str) -> Result<String> {
        let url = normalize_url(url)?;
        info!(%url, "navigating");

        let mut guard = self.browser.lock().await;
        let browser = self.ensure_launched(&mut guard).await?;
        let page = browser
            .new_page(url.as_str())
            .await
            .map_err(|e| AssistantError::Browser(format!("new page failed: {e}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| AssistantError::Browser(format!("navigation failed: {e}")))?;
        Ok(url)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        debug!(%selector, "clicking element");
        let mut guard = self.browser.lock().await;
        let browser = self.ensure_launched(&mut guard).await?;
        let page = self.active_page(browser).await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| AssistantError::Browser(format!("element not found: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| AssistantError::Browser(format!("click failed: {e}")))?;
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        debug!(%selector, "typing into element");
        let mut guard = self.browser.lock().await;
        let browser = self.ensure_launched(&mut guard).await?;
        let page = self.active_page(browser).await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| AssistantError::Browser(format!("element not found: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| AssistantError::Browser(format!("focus failed: {e}")))?;
        element
            .type_str(text)
            .await
            .map_err(|e| AssistantError::Browser(format!("typing failed: {e}")))?;
        Ok(())
    }

    async fn close(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("browser close failed: {e}");
            }
            let _ = browser.wait().await;
            info!("browser closed");
        }
    }
}

/// Spoken URLs often arrive without a scheme; default to https and
/// validate the result.
fn normalize_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = url::Url::parse(&candidate)
        .map_err(|e| AssistantError::Browser(format!("invalid url {trimmed:?}: {e}")))?;
    Ok(parsed.into())
}
