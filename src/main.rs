//! # Voice Gateway - Main Application Entry Point
//!
//! Front door for a streaming voice agent. One Actix-web listener:
//! - serves the web client from a static directory
//! - answers `GET /health` for orchestrators
//! - accepts WebSocket upgrades and logs every JSON message clients send
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: Every connection is handled by non-blocking tasks on an event loop
//! - **Result<T, E>**: Startup failures (bad config, port in use) end the process with a message
//! - **Ownership**: The [`server::Application`] value owns the listeners; dropping
//!   out of `main` only happens after they were shut down
//!
//! ## Application Architecture:
//! - **config**: Configuration from config.toml and environment variables
//! - **server**: The application context that binds and stops listeners
//! - **static_files / health**: The HTTP front door
//! - **websocket / message / forward**: The WebSocket ingress
//! - **state / middleware**: Shared metrics and request logging
//! - **error**: Error types and their HTTP rendering

mod config;
mod error;
mod forward;
mod health;
mod message;
mod middleware;
mod server;
mod state;
mod static_files;
mod websocket;

use anyhow::Result;
use crate::config::AppConfig;
use crate::server::Application;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Builds the application**, binding every configured port
/// 4. **Waits** for a shutdown signal (or a server failing on its own)
/// 5. **Shuts down** every listener gracefully
#[actix_web::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: {} (static root {})",
        config.http_bind_addr(),
        config.static_files.root.display()
    );

    let mut app = Application::build(config)?;
    match app.ws_addr() {
        Some(ws_addr) => info!("Ready: http://{} and ws://{}", app.http_addr(), ws_addr),
        None => info!("Ready: http://{} (WebSocket on the same port)", app.http_addr()),
    }

    tokio::select! {
        result = app.wait() => {
            if let Err(e) = result {
                error!("Server error: {:#}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    let metrics = app.state().get_metrics_snapshot();
    info!(
        total_connections = metrics.total_connections,
        messages_received = metrics.messages_received,
        malformed_messages = metrics.malformed_messages,
        "Final WebSocket totals"
    );

    app.shutdown().await;
    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "voice_gateway=trace")
/// - If not set, defaults to "voice_gateway=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_gateway=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
