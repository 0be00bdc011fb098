use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wormhole_server::{Config, Server, app};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wormhole_server=info,tower_http=warn")),
        )
        .init();

    info!("WormHole server v{}", env!("CARGO_PKG_VERSION"));
    info!("Base domain: {}", config.base_domain);

    let bind_addr = config.bind_addr();
    let server = Arc::new(Server::new(config));
    let router = app(server);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("WormHole server listening on http://{}", listener.local_addr()?);
    info!("Waiting for tunnel connections...");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    } else {
        info!("Received Ctrl-C, shutting down...");
    }
}
