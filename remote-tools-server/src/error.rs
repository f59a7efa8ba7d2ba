//! API error type and HTTP status mapping
//!
//! Every failure surfaces to the client as JSON `{"detail": ...}` with a
//! status that distinguishes caller mistakes (400), rate limiting (429),
//! upstream failures (502), navigation timeouts (504), and server-side
//! problems (500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use remote_tools_web::{PageFetchError, SearchError};

/// Errors returned by the tool endpoints
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session spent its open-page budget for the current window
    #[error("Session exceeded allowed open-page calls. Please reduce tool usage.")]
    RateLimited,
    /// The request body failed validation
    #[error("{0}")]
    InvalidRequest(String),
    /// Search credentials are missing from the configuration
    #[error("Google search is not configured. Set GOOGLE_API_KEY and GOOGLE_CX.")]
    SearchNotConfigured,
    /// The search upstream failed
    #[error("{0}")]
    Search(SearchError),
    /// The page fetch failed
    #[error("{0}")]
    Fetch(PageFetchError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SearchNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Search(err) => match err {
                SearchError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
                SearchError::Network(_) | SearchError::Upstream { .. } | SearchError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            ApiError::Fetch(err) => match err {
                PageFetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PageFetchError::Navigation { .. } | PageFetchError::Browser(_) => {
                    StatusCode::BAD_GATEWAY
                }
                PageFetchError::BrowserUnavailable(_)
                | PageFetchError::Launch(_)
                | PageFetchError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotConfigured => ApiError::SearchNotConfigured,
            other => ApiError::Search(other),
        }
    }
}

impl From<PageFetchError> for ApiError {
    fn from(err: PageFetchError) -> Self {
        ApiError::Fetch(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {detail}");
        } else {
            tracing::warn!(status = status.as_u16(), "Request rejected: {detail}");
        }
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
