//! Portfolio SWR - portfolio server backed by a stale-while-revalidate cache
//!
//! Serves brokerage portfolios per bearer token, deduplicating upstream
//! fetches and revalidating subscribed entries in the background.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_swr::api::{create_router, AppState};
use portfolio_swr::{spawn_eviction_task, Config};

/// Main entry point for the portfolio server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the portfolio source and cache
/// 4. Start background eviction task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_swr=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting portfolio server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: refresh_interval={}ms, max_age={}ms, max_entries={}, port={}, upstream={}",
        config.refresh_interval_ms,
        config.max_age_ms,
        config.max_entries,
        config.server_port,
        config.portfolio_api_url
    );

    let state = AppState::from_config(&config).context("Failed to initialize portfolio cache")?;
    info!("Portfolio cache initialized");

    let eviction_handle = spawn_eviction_task(state.cache.clone(), config.sweep_interval);
    info!("Background eviction task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(eviction_handle))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the eviction task and allows graceful shutdown.
async fn shutdown_signal(eviction_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    eviction_handle.abort();
    warn!("Eviction task aborted");
}
