//! # Application Context
//!
//! Owns every listener the gateway runs:
//! - the **front door**: health check, metrics, WebSocket upgrades on any
//!   path, and static files for everything else
//! - an optional **WebSocket-only** listener on its own port
//!
//! ## Lifecycle:
//! 1. [`Application::build`] binds the listeners and starts serving
//! 2. [`Application::wait`] resolves if any server exits on its own
//! 3. [`Application::shutdown`] stops every listener gracefully
//!
//! Binding happens before anything is spawned, so a port that is already in
//! use is reported as an error from `build` instead of a failure in the
//! background.

use crate::config::{AppConfig, ServerConfig};
use crate::health;
use crate::middleware;
use crate::state::AppState;
use crate::static_files;
use crate::websocket::{self, is_upgrade_request};

use actix_cors::Cors;
use actix_web::dev::{fn_service, Server, ServerHandle};
use actix_web::{guard, web, App, HttpServer};
use anyhow::{Context, Result};
use futures_util::future::select_all;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;

/// Running listeners plus the state they share.
pub struct Application {
    state: AppState,
    http_addr: SocketAddr,
    ws_addr: Option<SocketAddr>,
    handles: Vec<ServerHandle>,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
}

impl Application {
    /// Bind the configured ports and start serving.
    pub fn build(config: AppConfig) -> Result<Self> {
        Self::build_with_state(AppState::new(config))
    }

    /// Like [`build`](Self::build), with caller-supplied state (and so a
    /// caller-supplied forwarder).
    pub fn build_with_state(state: AppState) -> Result<Self> {
        let config = state.get_config();

        let http_addr = config.http_bind_addr();
        let http = TcpListener::bind(&http_addr)
            .with_context(|| format!("failed to bind HTTP listener on {}", http_addr))?;

        let ws = match config.ws_bind_addr() {
            Some(ws_addr) => Some(
                TcpListener::bind(&ws_addr)
                    .with_context(|| format!("failed to bind WebSocket listener on {}", ws_addr))?,
            ),
            None => None,
        };

        Self::from_listeners(state, http, ws)
    }

    /// Start serving on listeners that are already bound.
    pub fn from_listeners(
        state: AppState,
        http: TcpListener,
        ws: Option<TcpListener>,
    ) -> Result<Self> {
        let server_config = state.get_config().server.clone();
        let index_file = state.get_config().static_files.index_file.clone();
        let static_root = static_files::resolve_root(&state.get_config().static_files);

        let http_addr = http.local_addr()?;
        let mut servers = vec![front_door(state.clone(), http, &server_config, static_root, index_file)?];
        info!("HTTP server running on {}", http_addr);

        let ws_addr = match ws {
            Some(listener) => {
                let addr = listener.local_addr()?;
                servers.push(websocket_only(state.clone(), listener, &server_config)?);
                info!("WebSocket listener running on {}", addr);
                Some(addr)
            }
            None => {
                info!("WebSocket upgrades share the HTTP port {}", http_addr.port());
                None
            }
        };

        let handles = servers.iter().map(Server::handle).collect();
        let tasks = servers.into_iter().map(tokio::spawn).collect();

        Ok(Self {
            state,
            http_addr,
            ws_addr,
            handles,
            tasks,
        })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Address of the dedicated WebSocket listener, if one was started.
    pub fn ws_addr(&self) -> Option<SocketAddr> {
        self.ws_addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Resolves when any of the servers stops by itself.
    pub async fn wait(&mut self) -> Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        let (finished, index, _) = select_all(self.tasks.iter_mut()).await;
        // A completed JoinHandle must not be polled again by `shutdown`.
        drop(self.tasks.swap_remove(index));

        match finished {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e).context("server stopped with an error"),
            Err(e) => Err(e).context("server task failed"),
        }
    }

    /// Stop accepting connections and let in-flight requests finish.
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.stop(true).await;
        }

        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error during shutdown: {}", e),
                Err(e) => error!("Server task error during shutdown: {}", e),
            }
        }

        info!("All listeners stopped");
    }
}

/// HTTP front door with WebSocket upgrades on the same port.
fn front_door(
    state: AppState,
    listener: TcpListener,
    server_config: &ServerConfig,
    static_root: Option<PathBuf>,
    index_file: String,
) -> Result<Server> {
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(|cfg| routes(cfg, static_root.as_deref(), &index_file))
            .default_service(fn_service(static_files::not_found))
    })
    .workers(server_config.workers)
    .shutdown_timeout(server_config.shutdown_timeout_secs)
    .listen(listener)?
    .run();

    Ok(server)
}

/// Listener that only accepts WebSocket upgrades.
fn websocket_only(state: AppState, listener: TcpListener, server_config: &ServerConfig) -> Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(upgrade_route)
            .default_service(fn_service(static_files::not_found))
    })
    .workers(server_config.workers)
    .shutdown_timeout(server_config.shutdown_timeout_secs)
    .listen(listener)?
    .run();

    Ok(server)
}

/// Front door routes, in matching order. Static files come last because
/// they match every path.
pub fn routes(cfg: &mut web::ServiceConfig, static_root: Option<&Path>, index_file: &str) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(web::scope("/api/v1").route("/metrics", web::get().to(health::detailed_metrics)));

    upgrade_route(cfg);

    if let Some(root) = static_root {
        cfg.service(static_files::service(root, index_file));
    }
}

/// Any `GET` with `Upgrade: websocket`, whatever its path, becomes a socket.
pub fn upgrade_route(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{path:.*}")
            .guard(guard::Get())
            .guard(guard::fn_guard(|ctx| is_upgrade_request(ctx.head().headers())))
            .to(websocket::websocket_entry),
    );
}
