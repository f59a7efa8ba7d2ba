//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional
//! `remote-tools.toml` in the working directory, then environment variables
//! prefixed `REMOTE_TOOLS_` with `__` separating sections (for example
//! `REMOTE_TOOLS_RATE_LIMIT__PAGE_TOOL_LIMIT=5`). The bare `GOOGLE_API_KEY`
//! and `GOOGLE_CX` variables are honored as well since that is how the search
//! credentials are conventionally supplied.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use remote_tools_web::{FetchConfig, SearchConfig};
use serde::{Deserialize, Serialize};

/// Configuration file read from the working directory when present
pub const CONFIG_FILE: &str = "remote-tools.toml";

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port to bind, e.g. "0.0.0.0:8000"
    pub bind_addr: String,
    /// Allowed CORS origins; "*" allows any origin
    pub cors_origins: Vec<String>,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origins: vec!["*".to_string()],
            log_level: "info".to_string(),
        }
    }
}

/// Per-session usage limits for the open-page tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Allowed open-page calls per session within one TTL window
    pub page_tool_limit: u32,
    /// Rolling window length in seconds, measured from a session's first call
    pub session_ttl_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            page_tool_limit: 20,
            session_ttl_seconds: 3600,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Google Programmable Search Engine client settings
    pub google: SearchConfig,
    /// Headless browser settings
    pub browser: FetchConfig,
    /// Session usage limits
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Loads configuration from defaults, the optional TOML file, and the
    /// environment.
    pub fn load() -> Result<Self, figment::Error> {
        let mut config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("REMOTE_TOOLS_").split("__"))
            .extract()?;

        if config.google.api_key.is_empty() {
            if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
                config.google.api_key = key;
            }
        }
        if config.google.cx.is_empty() {
            if let Ok(cx) = std::env::var("GOOGLE_CX") {
                config.google.cx = cx;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), figment::Error> {
        if self.rate_limit.page_tool_limit == 0 {
            return Err(figment::Error::from(
                "rate_limit.page_tool_limit must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit.session_ttl_seconds == 0 {
            return Err(figment::Error::from(
                "rate_limit.session_ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(figment::Error::from(format!(
                "server.bind_addr is not a valid socket address: {}",
                self.server.bind_addr
            )));
        }
        Ok(())
    }
}
