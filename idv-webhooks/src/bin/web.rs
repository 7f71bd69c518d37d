//! IDV Web Server - receiver for vendor status callbacks.
//!
//! This binary runs the webhook endpoint that:
//! - Verifies the callback signature
//! - Applies the event to the local mirror, pulling fresh state from the API
//! - Answers 200 with a short text body (403 only on a bad signature)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use idv::signals::TracingHandler;
use idv::web::{router, AppState};
use idv::{store, ApiClient, Config, Mirror};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    info!(
        port = config.port,
        webhook_path = %config.webhook_path(),
        test_mode = config.test_mode,
        log_events = config.log_events,
        access_token_configured = config.access_token.is_some(),
        data_dir = ?config.data_dir,
        "config_loaded"
    );

    let store = store::open(config.data_dir.as_deref())
        .await
        .context("Failed to open data directory")?;
    let api = ApiClient::from_config(&config).context("Failed to build API client")?;

    let mirror = Mirror::new(Arc::new(api), store)
        .with_scrubbers(config.scrubbers())
        .connect(Arc::new(TracingHandler));

    // Create application state
    let port = config.port;
    let state = AppState::new(config, mirror).context("Invalid signature configuration")?;
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
