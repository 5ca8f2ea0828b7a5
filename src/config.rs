//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Deployment-style variables (HOST, PORT, WS_PORT, STATIC_DIR)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **Option<T>**: A value that may be absent (used for the optional WebSocket port)
//! - **PathBuf**: An owned filesystem path
//!
//! ## Configuration Priority (highest to lowest):
//! 1. HOST, PORT, WS_PORT, STATIC_DIR
//! 2. Environment variables (APP_SERVER__PORT, APP_STATIC_FILES__ROOT, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// The listener settings and the static file settings change for different
/// reasons (deployment vs. frontend bundle layout), so they live in separate
/// sections of config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
}

/// Listener configuration.
///
/// ## Fields:
/// - `host`: IP address to bind every listener to (e.g., "0.0.0.0", "127.0.0.1")
/// - `port`: TCP port of the HTTP front door; WebSocket upgrades are accepted here too
/// - `ws_port`: Optional port for a listener that only accepts WebSocket upgrades
/// - `workers`: Number of event-loop threads serving connections
/// - `shutdown_timeout_secs`: How long a graceful shutdown waits for open connections
/// - `max_frame_size`: Largest WebSocket message accepted, in bytes, whether it
///   arrives as one frame or in fragments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub ws_port: Option<u16>,
    pub workers: usize,
    pub shutdown_timeout_secs: u64,
    pub max_frame_size: usize,
}

/// Static file serving configuration.
///
/// ## Fields:
/// - `root`: Directory that `GET /<path>` requests are served from
/// - `index_file`: File served for `GET /` (and any directory request)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
    pub index_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),  // Every interface, like a bare `listen(PORT)`
                port: 4000,
                ws_port: None,                // Share the HTTP port unless WS_PORT is set
                workers: 1,                   // One event loop
                shutdown_timeout_secs: 30,
                max_frame_size: 100 * 1024 * 1024,  // 100 MiB, room for large audio chunks
            },
            static_files: StaticFilesConfig {
                root: PathBuf::from("static"),
                index_file: "index.html".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from config.toml and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from_env(env::vars().collect())
    }

    /// Load configuration using `vars` in place of the process environment.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with `APP_`-prefixed variables, `__` separating nested keys
    /// 4. Override with HOST, PORT, WS_PORT and STATIC_DIR
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__WORKERS=4`: Run four event loops
    /// - `APP_STATIC_FILES__INDEX_FILE=app.html`: Serve app.html for `/`
    /// - `PORT=3000`: Move the HTTP front door to port 3000
    /// - `WS_PORT=8081`: Also accept WebSocket upgrades on a dedicated port 8081
    pub fn load_from_env(vars: ::config::Map<String, String>) -> Result<Self> {
        let mut settings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&AppConfig::default())?)
            .add_source(::config::File::with_name("config").required(false))
            .add_source(
                ::config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .source(Some(vars.clone())),
            );

        // Variables commonly set by deployment platforms, without the APP_ prefix.
        // An empty value counts as unset.
        for (var, key) in [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("WS_PORT", "server.ws_port"),
            ("STATIC_DIR", "static_files.root"),
        ] {
            if let Some(value) = vars.get(var).filter(|value| !value.trim().is_empty()) {
                settings = settings.set_override(key, value.as_str())?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - The HTTP port is not 0 (an ephemeral port would be unreachable for clients)
    /// - At least one worker is configured
    /// - WebSocket messages may be at least one byte long
    /// - The index file name is not empty
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.ws_port == Some(0) {
            return Err(anyhow::anyhow!("WebSocket port cannot be 0"));
        }

        if self.server.workers == 0 {
            return Err(anyhow::anyhow!("Worker count must be greater than 0"));
        }

        if self.server.max_frame_size == 0 {
            return Err(anyhow::anyhow!("Maximum WebSocket frame size must be greater than 0"));
        }

        if self.static_files.index_file.trim().is_empty() {
            return Err(anyhow::anyhow!("Index file name cannot be empty"));
        }

        Ok(())
    }

    /// The port of the WebSocket-only listener, if one should be started.
    ///
    /// A `ws_port` equal to the HTTP port means the two services share one
    /// listener, which is already the default behaviour.
    pub fn dedicated_ws_port(&self) -> Option<u16> {
        self.server.ws_port.filter(|port| *port != self.server.port)
    }

    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn ws_bind_addr(&self) -> Option<String> {
        self.dedicated_ws_port()
            .map(|port| format!("{}:{}", self.server.host, port))
    }
}
