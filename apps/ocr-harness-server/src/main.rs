//! OCR Harness Server
//!
//! Serves the event log API used by the OCR demo's diagnostics panel.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocr_harness_server::config::Config;
use ocr_harness_server::logging::{details, EventLogger, TracingBridge};
use ocr_harness_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    let (config, config_error) = match Config::from_env() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let logger = EventLogger::new(config.logging.log_config());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ocr_harness_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.capture_tracing.then(|| TracingBridge::new(logger.clone())))
        .init();

    if let Some(e) = config_error {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
    }

    tracing::info!("Starting OCR Harness Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Event log capacity {} (session {})",
        config.logging.max_logs,
        logger.session_id()
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let state = AppState::new(config.clone(), logger.clone());
    let app = ocr_harness_server::app(state);

    logger.info(
        "Backend server started",
        details(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "environment": config.server.environment,
        })),
    );

    tracing::info!("OCR Harness Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    logger.info("Backend server shutting down", None);
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
