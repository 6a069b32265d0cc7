// src/core/metrics.rs

//! Defines and registers Prometheus metrics for gateway monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, Histogram, TextEncoder, register_counter, register_gauge, register_histogram,
};

lazy_static! {
    // --- Gauges ---
    /// The number of clients currently connected to the gateway.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("browsergate_connected_clients", "Number of currently connected clients.").unwrap();
    /// The number of live browser sessions.
    pub static ref ACTIVE_SESSIONS: Gauge =
        register_gauge!("browsergate_active_sessions", "Number of live browser sessions.").unwrap();
    /// The number of warm contexts sitting idle in the pool.
    pub static ref POOL_IDLE_CONTEXTS: Gauge =
        register_gauge!("browsergate_pool_idle_contexts", "Number of warm browser contexts held ready in the pool.").unwrap();

    // --- Counters ---
    /// The total number of connections accepted since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("browsergate_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of commands processed since startup.
    pub static ref COMMANDS_PROCESSED_TOTAL: Counter =
        register_counter!("browsergate_commands_processed_total", "Total number of commands processed.").unwrap();
    /// The total number of commands that produced a failure reply.
    pub static ref COMMANDS_FAILED_TOTAL: Counter =
        register_counter!("browsergate_commands_failed_total", "Total number of commands that failed.").unwrap();
    /// The total number of admissions rejected by the rate limiter.
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("browsergate_rate_limited_total", "Total number of rate-limited admissions.").unwrap();
    /// The total number of sessions closed by the idle reaper.
    pub static ref SESSIONS_REAPED_TOTAL: Counter =
        register_counter!("browsergate_sessions_reaped_total", "Total number of idle sessions reaped.").unwrap();
    /// The total number of result-cache hits.
    pub static ref CACHE_HITS_TOTAL: Counter =
        register_counter!("browsergate_cache_hits_total", "Total number of result cache hits.").unwrap();
    /// The total number of result-cache misses.
    pub static ref CACHE_MISSES_TOTAL: Counter =
        register_counter!("browsergate_cache_misses_total", "Total number of result cache misses.").unwrap();
    /// The total number of cache entries dropped by mutation-driven invalidation.
    pub static ref CACHE_INVALIDATIONS_TOTAL: Counter =
        register_counter!("browsergate_cache_invalidations_total", "Total number of cache entries invalidated.").unwrap();
    /// The total number of browser contexts discarded as unhealthy or aged out.
    pub static ref CONTEXTS_DISCARDED_TOTAL: Counter =
        register_counter!("browsergate_contexts_discarded_total", "Total number of browser contexts discarded.").unwrap();

    // --- Histograms ---
    /// A histogram of command execution latencies.
    pub static ref COMMAND_LATENCY_SECONDS: Histogram =
        register_histogram!("browsergate_command_latency_seconds", "Latency of command processing in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text
/// format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
