//! Router construction and tool handlers
//!
//! The shared [`AppState`] owns the search client, the page extractor, and the
//! session counter. The extractor sits behind a trait object so tests can
//! exercise the full request path, including rate limiting and HTML
//! simplification, without launching a browser.

use crate::config::AppConfig;
use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::routing::{get, post};
use axum::{Json, Router};
use remote_tools_web::{
    simplify_html, OpenPageRequest, OpenPageResponse, PageExtractor, PageFetcher, PageSnapshot,
    SearchClient, SearchRequest, SearchResponse, SessionCounter,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Number of user-agent characters folded into derived session identities
const SESSION_UA_PREFIX_LEN: usize = 40;

/// Shared state behind every handler
pub struct AppState {
    /// Loaded application configuration
    pub config: AppConfig,
    /// Google Programmable Search Engine client
    pub search: SearchClient,
    /// Page fetcher, swappable for tests
    pub extractor: Arc<dyn PageExtractor>,
    /// Per-session usage ledger for the open-page tool
    pub sessions: Arc<SessionCounter>,
}

/// Builds production state from configuration
pub fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let search = SearchClient::new(config.google.clone())?;
    let extractor: Arc<dyn PageExtractor> = Arc::new(PageFetcher::new(config.browser.clone()));
    let sessions = Arc::new(SessionCounter::new(Duration::from_secs(
        config.rate_limit.session_ttl_seconds,
    )));
    Ok(Arc::new(AppState {
        config,
        search,
        extractor,
        sessions,
    }))
}

/// Builds the application router over the given state
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/tools/google-search", post(google_search))
        .route("/tools/open-page", post(open_page))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until the task is stopped
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = build_state(config)?;
    let bind_addr: SocketAddr = state.config.server.bind_addr.parse()?;
    let router = build_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Remote Tools server listening on {bind_addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(values))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Remote Tools",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "ok",
    }))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn google_search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    if !state.search.is_configured() {
        return Err(ApiError::SearchNotConfigured);
    }
    let response = state.search.search(&request).await?;
    Ok(Json(response))
}

async fn open_page(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<OpenPageRequest>, JsonRejection>,
) -> Result<Json<OpenPageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    let session_id = derive_session_id(&request, &headers, peer);
    let count = state.sessions.increment_and_get(&session_id);
    let limit = u64::from(state.config.rate_limit.page_tool_limit);
    if count > limit {
        tracing::warn!(session_id = %session_id, limit, "Session exceeded open-page limit");
        return Err(ApiError::RateLimited);
    }

    tracing::debug!(session_id = %session_id, count, url = %request.url, "Opening page");
    let snapshot = state.extractor.fetch(&request).await?;
    Ok(Json(shape_response(&request, snapshot)))
}

/// Simplifies the extracted markup and shapes the wire response
fn shape_response(request: &OpenPageRequest, snapshot: PageSnapshot) -> OpenPageResponse {
    OpenPageResponse {
        url: request.url.clone(),
        final_url: snapshot.final_url,
        status: snapshot.status,
        title: snapshot.title,
        html: snapshot
            .html
            .map(|html| simplify_html(&html, request.keep_attributes)),
        text: snapshot.text,
        links: snapshot.links,
        screenshot_base64: snapshot.screenshot_base64,
        timing_ms: Some(snapshot.timing_ms),
    }
}

/// Session identity: explicit request field, else the `x-session-id` header,
/// else a best-effort fingerprint from client IP and user-agent prefix.
fn derive_session_id(request: &OpenPageRequest, headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(id) = request.session_id.as_deref() {
        if !id.is_empty() {
            return id.to_string();
        }
    }
    if let Some(id) = header_str(headers, "x-session-id") {
        if !id.is_empty() {
            return id.to_string();
        }
    }

    let client_ip = header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string());
    let user_agent = header_str(headers, header::USER_AGENT.as_str()).unwrap_or("-");
    let ua_prefix: String = user_agent.chars().take(SESSION_UA_PREFIX_LEN).collect();
    format!("{client_ip}|{ua_prefix}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
