//! # Application State Management
//!
//! This module manages state shared by every HTTP request handler and every
//! WebSocket connection. The only mutable part is the metrics; connections
//! themselves keep nothing here once they close.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Lets every worker thread hold the same state
//! - **Clone**: Cloning an `AppState` clones the pointers, not the data
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Many readers OR one writer at a time
//! - **Poisoning**: A lock is "poisoned" if a thread panicked while holding it.
//!   Counters are still meaningful after such a panic, so we recover the guard
//!   with `PoisonError::into_inner` instead of propagating the panic.

use crate::config::AppConfig;
use crate::forward::{Forwarder, LogForwarder};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The state shared across all handlers and connections.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration the server was started with (read-only)
    pub config: Arc<AppConfig>,

    /// Counters updated by the middleware and the WebSocket actors
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Where decoded WebSocket messages are handed to
    pub forwarder: Arc<dyn Forwarder>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests and WebSocket connections.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of HTTP responses with a 4xx/5xx status
    pub error_count: u64,

    /// WebSocket connections currently open
    pub active_connections: u32,

    /// WebSocket connections accepted since server start
    pub total_connections: u64,

    /// Inbound WebSocket messages that decoded successfully
    pub messages_received: u64,

    /// Inbound WebSocket messages that failed to decode
    pub malformed_messages: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Create state that logs inbound messages.
    pub fn new(config: AppConfig) -> Self {
        Self::with_forwarder(config, Arc::new(LogForwarder))
    }

    pub fn with_forwarder(config: AppConfig, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            forwarder,
            start_time: Instant::now(),
        }
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    fn metrics_mut(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn metrics_ref(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one HTTP request (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.metrics_mut().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics_mut().error_count += 1;
    }

    /// Record one request against its endpoint.
    ///
    /// The first time we see an endpoint, a zeroed `EndpointMetric` is created.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_mut();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// A WebSocket connection was established.
    pub fn connection_opened(&self) {
        let mut metrics = self.metrics_mut();
        metrics.active_connections += 1;
        metrics.total_connections += 1;
    }

    /// A WebSocket connection went away. Never drops below zero.
    pub fn connection_closed(&self) {
        let mut metrics = self.metrics_mut();
        metrics.active_connections = metrics.active_connections.saturating_sub(1);
    }

    pub fn message_received(&self) {
        self.metrics_mut().messages_received += 1;
    }

    pub fn message_malformed(&self) {
        self.metrics_mut().malformed_messages += 1;
    }

    /// Copy the metrics out so the lock is not held while serializing a response.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_ref().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed, from 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
