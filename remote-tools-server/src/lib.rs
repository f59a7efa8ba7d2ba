//! Remote Tools Server
//!
//! axum HTTP surface over `remote-tools-web`: two tool endpoints for LLM
//! agents (Google Programmable Search Engine search and headless-browser page
//! fetch) with per-session usage limits, plus health probes.

pub mod config;
pub mod error;
pub mod server;

pub use config::{AppConfig, RateLimitConfig, ServerConfig};
pub use error::ApiError;
pub use server::{build_router, build_state, serve, AppState};
