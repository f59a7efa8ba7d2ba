//! Core types for the search and page fetch tools
//!
//! This module defines the wire-level request and response structures for the
//! two tool endpoints, plus the configuration blocks consumed by the search
//! client and the page fetcher.

use serde::{Deserialize, Serialize};
use url::Url;

// ============================================================================
// Search Types
// ============================================================================

/// Maximum number of results the Programmable Search Engine returns per call
pub const MAX_SEARCH_RESULTS: u32 = 10;

/// Request to the Google Programmable Search Engine tool
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    /// User query to search via the Programmable Search Engine
    pub query: String,
    /// Number of results to return (1-10)
    pub num: u32,
    /// Optional language restriction (e.g. "lang_en")
    pub language: Option<String>,
    /// Optional region/country code for geolocation bias (e.g. "us")
    pub region: Option<String>,
}

impl<'de> Deserialize<'de> for SearchRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        struct SearchRequestHelper {
            query: String,
            #[serde(default = "default_num")]
            num: u32,
            language: Option<String>,
            region: Option<String>,
        }

        let helper = SearchRequestHelper::deserialize(deserializer)?;

        if helper.query.trim().is_empty() {
            return Err(Error::custom("Query must not be empty"));
        }
        if !(1..=MAX_SEARCH_RESULTS).contains(&helper.num) {
            return Err(Error::custom(format!(
                "num must be between 1 and {MAX_SEARCH_RESULTS}"
            )));
        }

        Ok(SearchRequest {
            query: helper.query,
            num: helper.num,
            language: helper.language,
            region: helper.region,
        })
    }
}

fn default_num() -> u32 {
    MAX_SEARCH_RESULTS
}

/// A single search result as returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    /// 1-based rank within the returned page of results
    pub position: usize,
    /// Result page title
    pub title: String,
    /// Result page URL
    pub link: String,
    /// Display form of the result host (e.g. "docs.rs")
    pub display_link: Option<String>,
    /// Snippet of page content around the match
    pub snippet: Option<String>,
    /// Favicon URL synthesized from the display link
    pub favicon: Option<String>,
}

/// Response from the search tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Identifies the upstream search provider
    pub source: String,
    /// The query that was executed
    pub query: String,
    /// Number of results actually returned
    pub num: usize,
    /// Search results in rank order
    pub results: Vec<SearchItem>,
}

// ============================================================================
// Page Fetch Types
// ============================================================================

/// Navigation wait condition before extracting page content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// Wait for the load event only
    Load,
    /// Wait for DOMContentLoaded
    DomContentLoaded,
    /// Wait for the load event plus a settle delay for late resources
    #[default]
    NetworkIdle,
    /// Return as soon as navigation commits
    Commit,
}

/// Default navigation timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 35_000;
/// Upper bound on the navigation timeout a caller may request
pub const MAX_TIMEOUT_MS: u64 = 120_000;

/// Request to open a page and extract its content
#[derive(Debug, Clone, Serialize)]
pub struct OpenPageRequest {
    /// The URL to open and extract content from (http or https)
    pub url: String,
    /// Optional client/session identifier used to enforce per-session usage
    /// limits. When omitted the server derives a best-effort id from request
    /// headers and the peer address.
    pub session_id: Option<String>,
    /// Whether to capture a base64-encoded full-page screenshot
    pub screenshot: bool,
    /// Wait condition before extracting page content
    pub wait_until: WaitUntil,
    /// Navigation timeout in milliseconds (1-120000)
    pub timeout_ms: u64,
    /// Override configured max scroll attempts for lazy-loaded content
    pub max_scrolls: Option<u32>,
    /// Pause between scroll steps in milliseconds
    pub scroll_pause_ms: Option<u64>,
    /// Custom User-Agent string
    pub user_agent: Option<String>,
    /// Locale sent as Accept-Language (e.g. "en-US")
    pub locale: Option<String>,
    /// IANA timezone applied to the page (e.g. "America/New_York")
    pub timezone_id: Option<String>,
    /// Keep element attributes when simplifying the returned HTML
    pub keep_attributes: bool,
}

impl<'de> Deserialize<'de> for OpenPageRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        struct OpenPageRequestHelper {
            url: String,
            session_id: Option<String>,
            #[serde(default)]
            screenshot: bool,
            #[serde(default)]
            wait_until: WaitUntil,
            #[serde(default = "default_timeout_ms")]
            timeout_ms: u64,
            max_scrolls: Option<u32>,
            scroll_pause_ms: Option<u64>,
            user_agent: Option<String>,
            locale: Option<String>,
            timezone_id: Option<String>,
            #[serde(default)]
            keep_attributes: bool,
        }

        let helper = OpenPageRequestHelper::deserialize(deserializer)?;

        let parsed = Url::parse(&helper.url)
            .map_err(|e| Error::custom(format!("Invalid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::custom(format!(
                "Unsupported URL scheme '{}': only http and https are allowed",
                parsed.scheme()
            )));
        }

        if !(1..=MAX_TIMEOUT_MS).contains(&helper.timeout_ms) {
            return Err(Error::custom(format!(
                "timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }

        Ok(OpenPageRequest {
            url: helper.url,
            session_id: helper.session_id,
            screenshot: helper.screenshot,
            wait_until: helper.wait_until,
            timeout_ms: helper.timeout_ms,
            max_scrolls: helper.max_scrolls,
            scroll_pause_ms: helper.scroll_pause_ms,
            user_agent: helper.user_agent,
            locale: helper.locale,
            timezone_id: helper.timezone_id,
            keep_attributes: helper.keep_attributes,
        })
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// A hyperlink extracted from a fetched page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Absolute link target
    pub href: String,
    /// Visible link text, when non-empty
    pub text: Option<String>,
}

/// Raw extraction output produced by the page fetcher
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// URL the browser ended up on after redirects
    pub final_url: Option<String>,
    /// HTTP status of the document response
    pub status: Option<i64>,
    /// Page title
    pub title: Option<String>,
    /// Raw body HTML (before simplification)
    pub html: Option<String>,
    /// Plain text rendering of the body
    pub text: Option<String>,
    /// Links found on the page, deduplicated by href in document order
    pub links: Vec<Link>,
    /// Base64-encoded full-page PNG screenshot, when requested
    pub screenshot_base64: Option<String>,
    /// Wall-clock time spent fetching, in milliseconds
    pub timing_ms: u64,
}

/// Response from the open-page tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPageResponse {
    /// The URL that was requested
    pub url: String,
    /// URL the browser ended up on after redirects
    pub final_url: Option<String>,
    /// HTTP status of the document response
    pub status: Option<i64>,
    /// Page title
    pub title: Option<String>,
    /// Simplified body markup (see [`crate::simplify::simplify_html`])
    pub html: Option<String>,
    /// Plain text rendering of the body
    pub text: Option<String>,
    /// Links found on the page
    #[serde(default)]
    pub links: Vec<Link>,
    /// Base64-encoded full-page PNG screenshot, when requested
    pub screenshot_base64: Option<String>,
    /// Wall-clock fetch time in milliseconds
    pub timing_ms: Option<u64>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the Programmable Search Engine client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Google API key; search is unconfigured while empty
    pub api_key: String,
    /// Programmable Search Engine id (cx)
    pub cx: String,
    /// Result count used when a request does not specify one
    pub default_num: u32,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// API endpoint; overridable for tests
    pub endpoint: String,
    /// Retry policy for transient upstream failures
    pub retry: RetryConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cx: String::new(),
            default_num: 10,
            timeout_seconds: 15,
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Whether both credentials required by the API are present
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.cx.is_empty()
    }
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Cap on the delay between retries, in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Configuration for the headless browser page fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Run the browser headless
    pub headless: bool,
    /// Default navigation timeout in milliseconds
    pub timeout_ms: u64,
    /// Default Accept-Language locale
    pub locale: String,
    /// Default IANA timezone applied to pages
    pub timezone_id: String,
    /// Scroll attempts used to trigger lazy-loaded content
    pub max_scrolls: u32,
    /// Pause between scroll steps in milliseconds
    pub scroll_pause_ms: u64,
    /// Settle delay after load for the networkidle wait condition
    pub settle_delay_ms: u64,
    /// User-Agent override; a desktop default is used when unset
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            locale: "en-US".to_string(),
            timezone_id: "UTC".to_string(),
            max_scrolls: 8,
            scroll_pause_ms: 400,
            settle_delay_ms: 1000,
            user_agent: None,
        }
    }
}
