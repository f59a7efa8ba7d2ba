//! Remote Tools Web
//!
//! Core crate for the web tools exposed to LLM agents: Google Programmable
//! Search Engine queries and headless-browser page fetching, plus the pieces
//! that make browser output consumable, structural HTML simplification and a
//! per-session usage counter.
//!
//! This crate contains pure domain logic with no HTTP server dependency. The
//! HTTP surface lives in `remote-tools-server`.

pub mod chrome;
pub mod fetch;
pub mod search;
pub mod session;
pub mod simplify;
pub mod types;

// Re-export key types
pub use chrome::{is_chrome_available, locate_chrome, ChromeNotFound};
pub use fetch::{PageExtractor, PageFetchError, PageFetcher, DEFAULT_USER_AGENT};
pub use search::{SearchClient, SearchError, SEARCH_SOURCE};
pub use session::SessionCounter;
pub use simplify::simplify_html;
pub use types::{
    FetchConfig, Link, OpenPageRequest, OpenPageResponse, PageSnapshot, RetryConfig, SearchConfig,
    SearchItem, SearchRequest, SearchResponse, WaitUntil, DEFAULT_TIMEOUT_MS, MAX_SEARCH_RESULTS,
    MAX_TIMEOUT_MS,
};
