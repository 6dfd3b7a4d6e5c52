//! # FieldOps API Server
//!
//! Binary entry point for the dashboard API service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldops_api::{AppContext, Config, build_router};
use fieldops_cache::{CacheService, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(version = fieldops_api::VERSION, "Starting FieldOps API");

    // Initialize cache
    tracing::info!(
        namespace = %config.cache.namespace,
        backend = ?config.cache.backend,
        "Opening cache storage"
    );
    let storage = config.build_storage()?;
    let cache = Arc::new(CacheService::start(
        config.cache_config(),
        storage,
        Arc::new(SystemClock),
    ));

    if let Some(redis) = &config.redis {
        tracing::info!(url = %redis.url, channel = %redis.channel, "Connecting invalidation relay");
        if let Err(e) = cache.connect_relay(&redis.url, &redis.channel).await {
            // Local invalidation keeps working without the relay
            tracing::warn!(error = %e, "Invalidation relay unavailable");
        }
    }

    // Build router
    let ctx = AppContext::in_memory(cache.clone(), config.seed_demo_data);
    let app = build_router(ctx, &config.cors_origins);

    // Start server
    let addr = config.server_addr;
    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache.shutdown();
    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
