use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use newflower_dashboard::build_service;
use newflower_dashboard::config::Config;
use newflower_dashboard::http;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let missing = config.missing_settings();
    if !missing.is_empty() {
        tracing::warn!("Missing settings: {}", missing.join(", "));
    }

    let service = Arc::new(build_service(&config).await?);

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid DASHBOARD_HTTP_BIND '{}': {e}", config.server.bind))?;
    let router = http::router(service, config.server.bearer_token.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        %bind,
        auth = %config.server.bearer_token.as_deref().map(|_| "bearer").unwrap_or("none"),
        "Starting {}",
        config.server.name
    );

    axum::serve(listener, router).await?;
    Ok(())
}
