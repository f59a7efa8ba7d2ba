//! Google Programmable Search Engine client
//!
//! Thin JSON API client over the Custom Search endpoint. Transient upstream
//! failures (429, 5xx, network errors) are retried with exponential backoff;
//! everything else surfaces immediately. Malformed result items are skipped
//! rather than failing the whole response.

use crate::types::{RetryConfig, SearchConfig, SearchItem, SearchRequest, SearchResponse};
use serde::Deserialize;
use std::time::Duration;

/// Provider tag reported in every search response
pub const SEARCH_SOURCE: &str = "google_cse";

/// Errors that can occur during a Programmable Search Engine call
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// API key or engine id is missing from the configuration
    #[error("Search is not configured: GOOGLE_API_KEY and GOOGLE_CX are required")]
    NotConfigured,
    /// Transport-level failure talking to the API
    #[error("Search request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The API answered with a non-success status
    #[error("Search upstream returned status {status}: {message}")]
    Upstream {
        /// HTTP status code from the API
        status: u16,
        /// Body text or error summary from the API
        message: String,
    },
    /// The API answered 200 but the body was not the expected shape
    #[error("Failed to parse search response: {0}")]
    Parse(String),
}

impl SearchError {
    /// Whether a retry has a chance of succeeding
    fn is_transient(&self) -> bool {
        match self {
            SearchError::Network(err) => !err.is_builder(),
            SearchError::Upstream { status, .. } => *status == 429 || *status >= 500,
            SearchError::NotConfigured | SearchError::Parse(_) => false,
        }
    }
}

/// Client for the Google Custom Search JSON API
pub struct SearchClient {
    config: SearchConfig,
    http: reqwest::Client,
}

impl SearchClient {
    /// Creates a client from configuration; fails only if the underlying HTTP
    /// client cannot be constructed.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, http })
    }

    /// Whether the client holds the credentials the API requires
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Executes a search, retrying transient upstream failures per the
    /// configured backoff policy.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        if !self.config.is_configured() {
            return Err(SearchError::NotConfigured);
        }

        let retry = &self.config.retry;
        let mut delay = Duration::from_millis(retry.base_delay_ms);

        for attempt in 1..=retry.max_attempts.max(1) {
            match self.execute(request).await {
                Ok(body) => return Ok(self.build_response(request, body)),
                Err(err) if attempt < retry.max_attempts && err.is_transient() => {
                    tracing::warn!(
                        attempt,
                        max_attempts = retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transient search failure, retrying: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, retry);
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("retry loop returns on the final attempt")
    }

    async fn execute(&self, request: &SearchRequest) -> Result<CseResponse, SearchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("key", self.config.api_key.clone()),
            ("cx", self.config.cx.clone()),
            ("q", request.query.clone()),
            ("num", request.num.to_string()),
        ];
        if let Some(language) = &request.language {
            params.push(("lr", language.clone()));
        }
        if let Some(region) = &request.region {
            params.push(("gl", region.clone()));
        }

        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<CseResponse>()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))
    }

    fn build_response(&self, request: &SearchRequest, body: CseResponse) -> SearchResponse {
        let results = parse_results(body, request.num as usize);
        tracing::debug!(
            query = %request.query,
            count = results.len(),
            "Search completed"
        );
        SearchResponse {
            source: SEARCH_SOURCE.to_string(),
            query: request.query.clone(),
            num: results.len(),
            results,
        }
    }
}

fn next_delay(current: Duration, retry: &RetryConfig) -> Duration {
    let scaled = (current.as_millis() as f64 * retry.backoff_multiplier) as u64;
    Duration::from_millis(scaled.min(retry.max_delay_ms))
}

/// Converts raw API items into ranked results, skipping items without a title
/// or link and capping the list at the requested count in case the upstream
/// over-returns.
fn parse_results(body: CseResponse, limit: usize) -> Vec<SearchItem> {
    let mut results = Vec::with_capacity(body.items.len().min(limit));
    for item in body.items {
        if results.len() >= limit {
            break;
        }
        let (Some(title), Some(link)) = (item.title, item.link) else {
            tracing::debug!("Skipping search result item without title or link");
            continue;
        };
        let favicon = item.display_link.as_ref().map(|domain| {
            format!("https://www.google.com/s2/favicons?domain={domain}&sz=64")
        });
        results.push(SearchItem {
            position: results.len() + 1,
            title,
            link,
            display_link: item.display_link,
            snippet: item.snippet,
            favicon,
        });
    }
    results
}

/// Subset of the Custom Search JSON API response we consume
#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "displayLink")]
    display_link: Option<String>,
    snippet: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configured(endpoint: String) -> SearchConfig {
        SearchConfig {
            api_key: "test-key".to_string(),
            cx: "test-cx".to_string(),
            endpoint,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 4,
                backoff_multiplier: 2.0,
            },
            ..SearchConfig::default()
        }
    }

    fn request(query: &str) -> SearchRequest {
        serde_json::from_value(serde_json::json!({ "query": query })).unwrap()
    }

    fn items_body() -> serde_json::Value {
        serde_json::json!({
            "items": [
                {
                    "title": "The Rust Programming Language",
                    "link": "https://www.rust-lang.org/",
                    "displayLink": "www.rust-lang.org",
                    "snippet": "A language empowering everyone"
                },
                {
                    "title": "Rust (film)",
                    "link": "https://en.wikipedia.org/wiki/Rust_(film)",
                    "displayLink": "en.wikipedia.org",
                    "snippet": "2024 western film"
                }
            ]
        })
    }

    #[test]
    fn test_parse_results_ranks_and_synthesizes_favicons() {
        let body: CseResponse = serde_json::from_value(items_body()).unwrap();
        let results = parse_results(body, 10);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].position, 1);
        assert_eq!(results[1].position, 2);
        assert_eq!(results[0].title, "The Rust Programming Language");
        assert_eq!(
            results[0].favicon.as_deref(),
            Some("https://www.google.com/s2/favicons?domain=www.rust-lang.org&sz=64")
        );
    }

    #[test]
    fn test_parse_results_skips_malformed_items() {
        let body: CseResponse = serde_json::from_value(serde_json::json!({
            "items": [
                { "snippet": "no title or link" },
                { "title": "only title" },
                { "title": "Good", "link": "https://example.com" }
            ]
        }))
        .unwrap();

        let results = parse_results(body, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 1);
        assert_eq!(results[0].link, "https://example.com");
        assert!(results[0].favicon.is_none());
    }

    #[test]
    fn test_parse_results_caps_at_requested_num() {
        let body: CseResponse = serde_json::from_value(items_body()).unwrap();
        let results = parse_results(body, 1);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 1);
        assert_eq!(results[0].title, "The Rust Programming Language");
    }

    #[test]
    fn test_parse_results_empty_body() {
        let body: CseResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parse_results(body, 10).is_empty());
    }

    #[test]
    fn test_unconfigured_client_is_reported() {
        let client = SearchClient::new(SearchConfig::default()).unwrap();
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_search_fails_fast() {
        let client = SearchClient::new(SearchConfig::default()).unwrap();
        let result = client.search(&request("rust")).await;
        assert!(matches!(result, Err(SearchError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_search_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("key", "test-key"))
            .and(query_param("cx", "test-cx"))
            .and(query_param("q", "rust language"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(items_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            SearchClient::new(configured(format!("{}/customsearch/v1", server.uri()))).unwrap();
        let response = client.search(&request("rust language")).await.unwrap();

        assert_eq!(response.source, SEARCH_SOURCE);
        assert_eq!(response.query, "rust language");
        assert_eq!(response.num, 2);
        assert_eq!(response.results[1].position, 2);
    }

    #[tokio::test]
    async fn test_search_truncates_over_returned_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(items_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            SearchClient::new(configured(format!("{}/customsearch/v1", server.uri()))).unwrap();
        let request: SearchRequest =
            serde_json::from_value(serde_json::json!({ "query": "rust", "num": 1 })).unwrap();
        let response = client.search(&request).await.unwrap();

        assert_eq!(response.num, 1);
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(items_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            SearchClient::new(configured(format!("{}/customsearch/v1", server.uri()))).unwrap();
        let response = client.search(&request("rust")).await.unwrap();
        assert_eq!(response.num, 2);
    }

    #[tokio::test]
    async fn test_search_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&server)
            .await;

        let client =
            SearchClient::new(configured(format!("{}/customsearch/v1", server.uri()))).unwrap();
        let result = client.search(&request("rust")).await;
        assert!(matches!(
            result,
            Err(SearchError::Upstream { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            SearchClient::new(configured(format!("{}/customsearch/v1", server.uri()))).unwrap();
        let result = client.search(&request("rust")).await;
        match result {
            Err(SearchError::Upstream { status, message }) => {
                assert_eq!(status, 403);
                assert!(message.contains("quota"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_language_and_region_are_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("lr", "lang_en"))
            .and(query_param("gl", "us"))
            .respond_with(ResponseTemplate::new(200).set_body_json(items_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            SearchClient::new(configured(format!("{}/customsearch/v1", server.uri()))).unwrap();
        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "query": "rust",
            "language": "lang_en",
            "region": "us"
        }))
        .unwrap();
        client.search(&request).await.unwrap();
    }
}
