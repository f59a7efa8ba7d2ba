use anyhow::Context;
use remote_tools_server::config::AppConfig;
use remote_tools_server::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.server.log_level);

    tracing::info!(
        search_configured = config.google.is_configured(),
        page_tool_limit = config.rate_limit.page_tool_limit,
        "Starting Remote Tools server"
    );
    server::serve(config).await
}

/// RUST_LOG wins over the configured default level when set
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
