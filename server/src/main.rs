mod args;
mod config;
mod handler;
mod io;
mod protocol;
mod state;

use anyhow::Context;
use clap::Parser;
use filebridge_core::connection::ConnectionRegistry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;
use config::ServerConfig;
use state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("filebridge-server {} starting", VERSION);

    let config = ServerConfig::resolve(&args);
    let shutdown = CancellationToken::new();
    let state = AppState::new(ConnectionRegistry::with_network(), &config, shutdown.clone());
    let registry = state.registry.clone();

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    let router = io::http::build_router(state, &config.static_dir);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => warn!("Failed to listen for Ctrl+C: {e}"),
        }
        signal_token.cancel();
    });

    io::http::serve(listener, router, shutdown).await?;

    registry.close_all(config.shutdown_timeout()).await;
    info!("filebridge-server stopped");
    Ok(())
}
