//! Paygate Bridge - session-scoped bridge form, validation and progress core
//!
//! Serves the dashboard's bridge and transfer flows: form state, validation,
//! debounced route simulation, SDK progress tracking and error taxonomy.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod api;
mod bridge;
mod config;
mod error;
mod events;
mod hooks;
mod metrics;
mod sdk;
mod state;
mod store;
mod validation;

use config::Settings;
use metrics::MetricsServer;
use sdk::SandboxFactory;
use state::SessionManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Paygate Bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Arc::new(Settings::load()?);
    info!(
        "Loaded configuration for {} chains, {} tokens",
        settings.enabled_chains().len(),
        settings.bridge.supported_tokens.len()
    );

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Sessions get their SDK handle from the sandbox factory
    let factory = Arc::new(SandboxFactory::new(settings.clone()));
    let sessions = Arc::new(SessionManager::new(&settings, factory));

    // Start API server
    let api_handle = tokio::spawn({
        let api = settings.api.clone();
        let sessions = sessions.clone();
        async move {
            if let Err(e) = api::run_server(api, sessions).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    info!("Paygate Bridge is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Deny parked confirmations and stop session timers
    sessions.close_all().await;

    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Paygate Bridge stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,paygate_bridge=debug,hyper=warn"));

    let json = std::env::var("PAYGATE_LOG_FORMAT").map_or(false, |v| v == "json");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
