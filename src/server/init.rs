//! Server initialization
//!
//! Contains the main `run()` function that starts all server components.

use super::config::AppConfig;
use super::health::{detailed_routes, health_routes};
use anyhow::{Context, Result};
use sentinel_channels::DiscordAdapter;
use sentinel_core::{DisciplineEngineBuilder, SqliteStore, TokioScheduler};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the bot and its keep-alive server until shutdown
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Sentinel v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();

    let store = Arc::new(
        SqliteStore::from_path(Path::new(&config.database.path))
            .await
            .context("Failed to open ledger database")?,
    );
    info!("Ledger database ready at {}", config.database.path);

    let discord_config = config
        .discord
        .clone()
        .with_env_token()
        .context("Discord token missing")?;
    let adapter = Arc::new(DiscordAdapter::new(discord_config));

    let engine = Arc::new(
        DisciplineEngineBuilder::new()
            .store(store)
            .enforcer(adapter.clone())
            .notifier(adapter.clone())
            .scheduler(Arc::new(TokioScheduler::new(shutdown.child_token())))
            .config(config.discipline.clone())
            .build()
            .context("Invalid discipline configuration")?,
    );

    let bot_handle = {
        let adapter = adapter.clone();
        let engine = engine.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter.run(engine, shutdown.clone()).await {
                error!("Discord adapter error: {}", e);
                shutdown.cancel();
            }
        })
    };

    let app = health_routes().merge(detailed_routes(adapter, engine));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = wait_for_shutdown_signal() => {}
                _ = server_shutdown.cancelled() => {}
            }
            server_shutdown.cancel();
        })
        .await
        .context("HTTP server error")?;

    info!("Waiting for Discord adapter to finish...");
    let adapter_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(adapter_timeout, bot_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Discord adapter task error: {}", e),
        Err(_) => warn!("Discord adapter shutdown timeout, aborting"),
    }

    info!("Sentinel shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
