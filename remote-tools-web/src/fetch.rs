//! Headless browser page fetching
//!
//! Drives a local Chrome/Chromium instance over CDP to open a page, wait for
//! it to load, trigger lazy content by scrolling, and extract the document
//! HTML, text, title, links, and optionally a full-page screenshot.
//!
//! The [`PageExtractor`] trait is the seam between the HTTP layer and the
//! browser: the server holds a `dyn PageExtractor`, which lets tests exercise
//! the full request path without launching a browser.

use crate::chrome::{self, ChromeNotFound};
use crate::types::{FetchConfig, Link, OpenPageRequest, PageSnapshot, WaitUntil};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetTimezoneOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Desktop User-Agent used when neither the request nor the configuration
/// provides one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--disable-gpu",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-features=site-per-process",
];

// Resolves relative hrefs against the page URL; anchors whose href cannot be
// parsed as a URL are dropped.
const LINKS_JS: &str = r#"
Array.from(document.querySelectorAll('a[href]')).flatMap(a => {
    try {
        return [{
            href: new URL(a.getAttribute('href'), location.href).href,
            text: (a.textContent || '').trim()
        }];
    } catch {
        return [];
    }
})
"#;

/// Errors that can occur while fetching a page
#[derive(Debug, thiserror::Error)]
pub enum PageFetchError {
    /// No Chrome/Chromium executable is available on this host
    #[error("{0}")]
    BrowserUnavailable(#[from] ChromeNotFound),
    /// The browser could not be configured or launched
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    /// CDP-level failure while driving the browser
    #[error("Browser error: {0}")]
    Browser(Box<CdpError>),
    /// The page could not be navigated to
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// The URL that was being opened
        url: String,
        /// Failure detail from the browser
        message: String,
    },
    /// The fetch did not complete within the requested timeout
    #[error("Navigation timed out after {0} ms")]
    Timeout(u64),
    /// Page content could not be extracted
    #[error("Content extraction failed: {0}")]
    Extraction(String),
}

impl From<CdpError> for PageFetchError {
    fn from(err: CdpError) -> Self {
        PageFetchError::Browser(Box::new(err))
    }
}

/// Fetches a page and produces a raw [`PageSnapshot`]
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Opens the requested URL and extracts its content
    async fn fetch(&self, request: &OpenPageRequest) -> Result<PageSnapshot, PageFetchError>;
}

/// Browser-backed page fetcher
pub struct PageFetcher {
    config: FetchConfig,
}

impl PageFetcher {
    /// Creates a fetcher with the given browser configuration
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    async fn fetch_with_browser(
        &self,
        request: &OpenPageRequest,
    ) -> Result<PageSnapshot, PageFetchError> {
        let started = Instant::now();
        let chrome_path = chrome::locate_chrome()?;

        // A unique profile directory per fetch avoids SingletonLock conflicts
        // when fetches run concurrently.
        let profile_dir = tempfile::Builder::new()
            .prefix("remote-tools-profile-")
            .tempdir()
            .map_err(|e| PageFetchError::Launch(format!("profile directory: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .user_data_dir(profile_dir.path())
            .window_size(1366, 768)
            .args(BROWSER_ARGS.iter().copied());
        if !self.config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(PageFetchError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(browser_config).await?;

        // Chrome can emit CDP messages chromiumoxide does not recognize;
        // deserialization failures must not kill the connection.
        let handler_task = tokio::spawn(async move {
            while let Some(item) = handler.next().await {
                if let Err(e) = item {
                    let text = e.to_string();
                    if text.contains("data did not match any variant of untagged enum Message") {
                        continue;
                    }
                    tracing::debug!("CDP message error (continuing): {e}");
                    if text.contains("connection closed")
                        || text.contains("io error")
                        || text.contains("websocket closed")
                    {
                        break;
                    }
                }
            }
        });

        let result = tokio::time::timeout(
            Duration::from_millis(request.timeout_ms),
            self.run_page(&browser, request),
        )
        .await
        .unwrap_or(Err(PageFetchError::Timeout(request.timeout_ms)));

        if let Err(e) = browser.close().await {
            tracing::debug!("Browser close error (ignored): {e}");
        }
        handler_task.abort();
        drop(profile_dir);

        result.map(|mut snapshot| {
            snapshot.timing_ms = started.elapsed().as_millis() as u64;
            snapshot
        })
    }

    async fn run_page(
        &self,
        browser: &Browser,
        request: &OpenPageRequest,
    ) -> Result<PageSnapshot, PageFetchError> {
        let page = browser.new_page("about:blank").await?;

        // Capture the HTTP status of the main document response. The listener
        // must be registered before navigation starts.
        let status: Arc<Mutex<Option<i64>>> = Arc::new(Mutex::new(None));
        let status_slot = Arc::clone(&status);
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let status_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if matches!(event.r#type, ResourceType::Document) {
                    if let Ok(mut slot) = status_slot.lock() {
                        if slot.is_none() {
                            *slot = Some(event.response.status);
                        }
                    }
                }
            }
        });

        self.apply_overrides(&page, request).await?;

        tracing::debug!(url = %request.url, "Navigating");
        page.goto(request.url.as_str())
            .await
            .map_err(|e| PageFetchError::Navigation {
                url: request.url.clone(),
                message: e.to_string(),
            })?;

        // goto resolves once navigation commits; the stricter wait conditions
        // block until the load event, with a settle delay for networkidle.
        match request.wait_until {
            WaitUntil::Commit => {}
            WaitUntil::DomContentLoaded | WaitUntil::Load => {
                page.wait_for_navigation()
                    .await
                    .map_err(|e| PageFetchError::Navigation {
                        url: request.url.clone(),
                        message: e.to_string(),
                    })?;
            }
            WaitUntil::NetworkIdle => {
                page.wait_for_navigation()
                    .await
                    .map_err(|e| PageFetchError::Navigation {
                        url: request.url.clone(),
                        message: e.to_string(),
                    })?;
                tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
            }
        }

        let plan = ScrollPlan::resolve(request, &self.config);
        self.auto_scroll(&page, plan).await?;

        let final_url = page.url().await?;
        let title = page.get_title().await?;
        let html = self.extract_html(&page).await;
        let text = self.evaluate_optional_string(&page, "document.body ? document.body.innerText : null").await;
        let links = self.extract_links(&page).await;

        let screenshot_base64 = if request.screenshot {
            self.capture_screenshot(&page).await
        } else {
            None
        };

        status_task.abort();
        let status = status.lock().map(|slot| *slot).unwrap_or(None);

        Ok(PageSnapshot {
            final_url,
            status,
            title,
            html,
            text,
            links,
            screenshot_base64,
            timing_ms: 0,
        })
    }

    async fn apply_overrides(
        &self,
        page: &Page,
        request: &OpenPageRequest,
    ) -> Result<(), PageFetchError> {
        let user_agent = request
            .user_agent
            .clone()
            .or_else(|| self.config.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let locale = request
            .locale
            .clone()
            .unwrap_or_else(|| self.config.locale.clone());

        let ua_params = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .accept_language(locale)
            .build()
            .map_err(PageFetchError::Extraction)?;
        page.execute(ua_params).await?;

        let timezone = request
            .timezone_id
            .clone()
            .unwrap_or_else(|| self.config.timezone_id.clone());
        page.execute(SetTimezoneOverrideParams::new(timezone))
            .await?;
        Ok(())
    }

    /// Scrolls to the bottom repeatedly to trigger lazy-loaded content,
    /// stopping early when the page height stops growing.
    async fn auto_scroll(&self, page: &Page, plan: ScrollPlan) -> Result<(), PageFetchError> {
        let mut last_height: i64 = 0;
        for _ in 0..plan.max_scrolls {
            page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await?;
            tokio::time::sleep(Duration::from_millis(plan.pause_ms)).await;
            let height: i64 = page
                .evaluate("document.body.scrollHeight")
                .await?
                .into_value()
                .map_err(|e| PageFetchError::Extraction(e.to_string()))?;
            if height == last_height {
                break;
            }
            last_height = height;
        }
        Ok(())
    }

    /// Body markup, falling back to the full document when the body is not
    /// directly readable (frameset pages, non-HTML documents).
    async fn extract_html(&self, page: &Page) -> Option<String> {
        match self
            .evaluate_optional_string(page, "document.body ? document.body.innerHTML : null")
            .await
        {
            Some(html) => Some(html),
            None => page.content().await.ok(),
        }
    }

    async fn evaluate_optional_string(&self, page: &Page, expression: &str) -> Option<String> {
        match page.evaluate(expression).await {
            Ok(result) => result.into_value::<Option<String>>().ok().flatten(),
            Err(e) => {
                tracing::debug!("Evaluation failed (ignored): {e}");
                None
            }
        }
    }

    async fn extract_links(&self, page: &Page) -> Vec<Link> {
        let raw = match page.evaluate(LINKS_JS).await {
            Ok(result) => result.into_value::<Vec<RawLink>>().unwrap_or_default(),
            Err(e) => {
                tracing::debug!("Link extraction failed (ignored): {e}");
                Vec::new()
            }
        };
        dedupe_links(raw)
    }

    async fn capture_screenshot(&self, page: &Page) -> Option<String> {
        let params = ScreenshotParams::builder().full_page(true).build();
        match page.screenshot(params).await {
            Ok(bytes) => Some(BASE64.encode(bytes)),
            Err(e) => {
                tracing::warn!("Screenshot capture failed (ignored): {e}");
                None
            }
        }
    }
}

#[async_trait]
impl PageExtractor for PageFetcher {
    async fn fetch(&self, request: &OpenPageRequest) -> Result<PageSnapshot, PageFetchError> {
        self.fetch_with_browser(request).await
    }
}

/// Scroll settings after request overrides are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScrollPlan {
    max_scrolls: u32,
    pause_ms: u64,
}

impl ScrollPlan {
    fn resolve(request: &OpenPageRequest, config: &FetchConfig) -> Self {
        Self {
            max_scrolls: request.max_scrolls.unwrap_or(config.max_scrolls),
            pause_ms: request.scroll_pause_ms.unwrap_or(config.scroll_pause_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLink {
    href: String,
    #[serde(default)]
    text: String,
}

/// Deduplicates links by href, keeping document order and the first text seen
fn dedupe_links(raw: Vec<RawLink>) -> Vec<Link> {
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for item in raw {
        if item.href.is_empty() || !seen.insert(item.href.clone()) {
            continue;
        }
        let text = item.text.trim();
        links.push(Link {
            href: item.href,
            text: if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            },
        });
    }
    links
}
