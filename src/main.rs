use anyhow::{Context, Result};
use sos_dispatch::api::{create_app, AppComponents};
use sos_dispatch::auth::StaticTokenResolver;
use sos_dispatch::config::{load_or_default, CONFIG_PATH_ENV};
use sos_dispatch::hub::ConnectionHub;
use sos_dispatch::store::InMemoryRecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sos_dispatch=info".into()),
        )
        .init();

    info!("SOS dispatch hub starting...");

    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let mut config = load_or_default(&config_path)?;
    config.apply_env();

    let identities = StaticTokenResolver::new(&config.auth.tokens);
    if config.auth.enabled && identities.is_empty() {
        warn!("Auth enabled with no tokens configured, every WebSocket upgrade will be rejected");
    }

    let hub = Arc::new(ConnectionHub::new(config.hub.outbound_queue_capacity));
    let app = create_app(AppComponents {
        hub,
        store: Arc::new(InMemoryRecordStore::new()),
        identities: Arc::new(identities),
        auth_enabled: config.auth.enabled,
        cors_allow_any: config.server.cors_allow_any,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!(
        bind_addr = %config.server.bind_addr,
        auth_enabled = config.auth.enabled,
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("SOS dispatch hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
