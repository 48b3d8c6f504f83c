//! Service binary.
//!
//! Reads configuration from a TOML file
//! (`~/.config/swapstation/config.toml`, overridable via
//! `SWAPSTATION_CONFIG`), wires the services over in-memory storage and
//! serves the REST API until SIGTERM/SIGINT.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use swapstation::application::ports::{AutoApproveRefundGateway, LoggingSubscriptionActivator};
use swapstation::application::{
    start_swap_sweeper, BookingService, PaymentService, SwapService,
};
use swapstation::shared::{listen_for_shutdown_signals, ShutdownSignal};
use swapstation::{create_router, default_config_path, AppConfig, AppState, InMemoryStorage, Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("SWAPSTATION_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let config = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .init();
            error!("Failed to load config: {}. Using defaults.", e);
            AppConfig::default()
        }
    };

    info!("Starting battery swap station service...");

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());

    let state = AppState {
        bookings: Arc::new(BookingService::new(storage.clone())),
        swaps: Arc::new(SwapService::new(storage.clone())),
        payments: Arc::new(PaymentService::new(
            storage.clone(),
            config.gateway.to_vnpay(),
            Arc::new(AutoApproveRefundGateway),
            Arc::new(LoggingSubscriptionActivator),
        )),
    };

    let shutdown = ShutdownSignal::new();
    tokio::spawn(listen_for_shutdown_signals(shutdown.clone()));

    let sweeper = start_swap_sweeper(
        storage.clone(),
        Duration::from_secs(config.sweeper.interval_secs),
        Duration::from_secs(config.sweeper.retry_timeout_minutes * 60),
        shutdown.clone(),
    );

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { server_shutdown.wait().await })
        .await?;

    info!("HTTP server stopped, waiting for background tasks");
    shutdown.trigger();
    let _ = sweeper.await;
    info!("Shutdown complete");
    Ok(())
}
