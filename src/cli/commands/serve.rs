use clap::Args;

use crate::app::{app, build_store, AppState};
use crate::config::config;

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (defaults to PORT or 3000)")]
    pub port: Option<u16>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = config();
    tracing::info!("Starting Natours API in {:?} mode", config.environment);

    let store = build_store(config).await?;
    tracing::info!("Document store: {}", store.kind());

    let state = AppState::from_config(store, config);
    let router = app(state, config);

    let port = args.port.unwrap_or(config.server.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Natours API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
