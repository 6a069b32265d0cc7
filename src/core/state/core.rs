// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide
//! state. It is wrapped in an `Arc` and passed to every task and connection
//! handler.

use super::client::{ClientMap, ConnectionMap};
use super::stats::StatsState;
use crate::config::Config;
use crate::core::cache::ResultCache;
use crate::core::errors::GatewayError;
use crate::core::pool::ContextPool;
use crate::core::ratelimit::RateLimiter;
use crate::core::sanitize::Sanitizer;
use crate::core::sessions::{SessionManager, TimeoutPolicy};
use crate::driver::{BrowserDriver, BrowserProfile};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, reload};

/// The single source of truth for the gateway's configuration and dynamic
/// state.
pub struct ServerState {
    /// Runtime configuration. Mutable behind a lock so operational knobs can
    /// change without a restart.
    pub config: Arc<Mutex<Config>>,
    /// All live transport connections, keyed by connection id. Holds a
    /// shutdown sender for targeted termination.
    pub connections: ConnectionMap,
    /// Client identities currently bound to at least one connection, plus
    /// those inside their disconnect grace period.
    pub clients: ClientMap,
    /// Session table and per-session workers.
    pub sessions: Arc<SessionManager>,
    /// The warm browser-context pool.
    pub pool: Arc<ContextPool>,
    /// The fingerprint-keyed result cache.
    pub cache: Arc<ResultCache>,
    /// Per-client sliding-window admission control.
    pub limiter: RateLimiter,
    /// Injection screening and URL normalization.
    pub sanitizer: Sanitizer,
    /// Server-wide statistics.
    pub stats: StatsState,
    /// Handle to the logging filter, for dynamic log level changes.
    pub log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
}

impl ServerState {
    /// Builds the full server state from configuration and a driver backend.
    /// The driver is injected so tests can run the whole gateway against the
    /// simulated backend.
    pub fn initialize(
        config: Config,
        driver: Arc<dyn BrowserDriver>,
        log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    ) -> Result<Arc<Self>, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Internal(format!("invalid configuration: {e}")))?;

        let profile = BrowserProfile {
            headless: config.browser.headless,
            viewport_width: config.browser.viewport_width,
            viewport_height: config.browser.viewport_height,
        };

        let cache = Arc::new(ResultCache::new(config.cache.capacity, config.cache.ttl));
        let pool = Arc::new(ContextPool::new(
            driver,
            profile,
            config.pool.warm_target,
            config.session.hard_ceiling,
            config.pool.acquire_timeout,
            config.pool.max_age,
        ));
        let sessions = Arc::new(SessionManager::new(
            pool.clone(),
            cache.clone(),
            TimeoutPolicy {
                default_ms: config.session.default_command_timeout_ms,
                max_ms: config.session.max_command_timeout_ms,
            },
        ));
        let limiter = RateLimiter::new(
            config.limits.rate_limit_per_minute,
            config.limits.rate_limit_block_threshold,
            config.limits.rate_limit_block,
            config.limits.rate_limit_reject_horizon,
        );
        let sanitizer = Sanitizer::new(config.security.allow_non_http_urls);

        if config.api_key.is_none() {
            info!("no api_key configured; connections are accepted unauthenticated");
        }

        Ok(Arc::new(Self {
            config: Arc::new(Mutex::new(config)),
            connections: Arc::new(DashMap::new()),
            clients: Arc::new(DashMap::new()),
            sessions,
            pool,
            cache,
            limiter,
            sanitizer,
            stats: StatsState::new(),
            log_reload_handle,
        }))
    }
}
