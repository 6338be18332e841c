//! grocery-admin - administration backend for the grocery schema
//!
//! Browse, edit and restructure the tables of one schema over a single
//! database session, snapshot them to replayable SQL scripts, and restore
//! from those scripts. A separate presentation layer drives everything
//! through the JSON API defined in [`routes`].

mod config;
mod connection;
mod db;
mod error;
mod export;
mod introspection;
mod models;
mod queries;
mod routes;
mod rows;
mod schema;
mod snapshot;
mod state;
#[cfg(test)]
mod test_support;

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting grocery-admin...");

    let settings = Settings::load()?;
    info!("Configuration loaded successfully");

    let session = connection::connect(&settings.database)
        .await
        .context("Cannot start server without a database connection")?;

    let state = Arc::new(AppState::new(session, &settings)?);
    info!(
        "Snapshots in {} ({} mode), exports in {}",
        settings.storage.backup_dir.display(),
        settings.storage.snapshot_mode,
        settings.storage.export_dir.display()
    );

    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!("Server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Compact output by default; `LOG_FORMAT=json` for one JSON object per line.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,grocery_admin=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
