//! Quick OIDC service
//!
//! Entry point: loads configuration, sets up logging and metrics, then
//! serves the router until SIGINT/SIGTERM.

use oidc_service::config::{Config, LogFormat};
use oidc_service::observability::metrics::init_metrics_recorder;
use oidc_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // LOG_FORMAT is part of the configuration, so load it before tracing
    let config = Config::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Text),
    );

    info!("Starting Quick OIDC service");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        issuer = %config.issuer_uri,
        jwks_uri = ?config.jwks_uri,
        audiences = ?config.audiences,
        algorithms = ?config.algorithms,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let bind_address = config.bind_address.clone();
    let drain = Duration::from_secs(config.shutdown_drain_seconds);

    let state = Arc::new(AppState::from_config(config));
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Quick OIDC service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain))
        .await?;

    info!("Quick OIDC service shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let (text_layer, json_layer) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oidc_service=debug,tower_http=debug".into()),
        )
        .with(text_layer)
        .with(json_layer)
        .init();
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain.is_zero() {
        info!("Skipping drain period (SHUTDOWN_DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain.as_secs());
        tokio::time::sleep(drain).await;
        info!("Drain period complete");
    }
}
