// src/config.rs

//! Server configuration: loading from TOML, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Configuration for TLS on the client-facing listener.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_cert_path() -> String {
    "browsergate.crt".to_string()
}
fn default_key_path() -> String {
    "browsergate.key".to_string()
}

/// Admission and abuse limits.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LimitsConfig {
    /// Sliding-window quota: commands admitted per client per minute.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: usize,
    /// Rejections within the horizon that trigger a cool-off block.
    #[serde(default = "default_rate_limit_block_threshold")]
    pub rate_limit_block_threshold: u32,
    /// Length of the cool-off block.
    #[serde(with = "humantime_serde", default = "default_rate_limit_block")]
    pub rate_limit_block: Duration,
    /// Horizon over which rejections are counted toward a block.
    #[serde(with = "humantime_serde", default = "default_rate_limit_reject_horizon")]
    pub rate_limit_reject_horizon: Duration,
    /// Consecutive undecodable frames before the connection is closed.
    #[serde(default = "default_max_malformed_frames")]
    pub max_malformed_frames: u32,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: default_rate_limit_per_minute(),
            rate_limit_block_threshold: default_rate_limit_block_threshold(),
            rate_limit_block: default_rate_limit_block(),
            rate_limit_reject_horizon: default_rate_limit_reject_horizon(),
            max_malformed_frames: default_max_malformed_frames(),
            max_clients: default_max_clients(),
        }
    }
}

fn default_rate_limit_per_minute() -> usize {
    120
}
fn default_rate_limit_block_threshold() -> u32 {
    20
}
fn default_rate_limit_block() -> Duration {
    Duration::from_secs(120)
}
fn default_rate_limit_reject_horizon() -> Duration {
    Duration::from_secs(60)
}
fn default_max_malformed_frames() -> u32 {
    5
}
fn default_max_clients() -> usize {
    1024
}

/// Session lifecycle settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionConfig {
    /// Sessions idle past this threshold are eligible for reaping.
    #[serde(with = "humantime_serde", default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    /// Interval between reaper scans.
    #[serde(with = "humantime_serde", default = "default_reap_interval")]
    pub reap_interval: Duration,
    /// How long a disconnected client keeps its sessions.
    #[serde(with = "humantime_serde", default = "default_disconnect_grace")]
    pub disconnect_grace: Duration,
    /// Maximum concurrent sessions (and checked-out browser contexts).
    #[serde(default = "default_hard_ceiling")]
    pub hard_ceiling: usize,
    #[serde(default = "default_command_timeout_ms")]
    pub default_command_timeout_ms: u64,
    #[serde(default = "default_max_command_timeout_ms")]
    pub max_command_timeout_ms: u64,
    /// Drain budget for in-flight commands at shutdown.
    #[serde(with = "humantime_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            reap_interval: default_reap_interval(),
            disconnect_grace: default_disconnect_grace(),
            hard_ceiling: default_hard_ceiling(),
            default_command_timeout_ms: default_command_timeout_ms(),
            max_command_timeout_ms: default_max_command_timeout_ms(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(300)
}
fn default_reap_interval() -> Duration {
    Duration::from_secs(30)
}
fn default_disconnect_grace() -> Duration {
    Duration::from_secs(15)
}
fn default_hard_ceiling() -> usize {
    16
}
fn default_command_timeout_ms() -> u64 {
    10_000
}
fn default_max_command_timeout_ms() -> u64 {
    120_000
}
fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

/// Warm browser-context pool settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PoolConfig {
    /// Contexts held pre-launched and idle.
    #[serde(default = "default_warm_target")]
    pub warm_target: usize,
    /// Contexts older than this are discarded at next release.
    #[serde(with = "humantime_serde", default = "default_pool_max_age")]
    pub max_age: Duration,
    /// Bounded wait for a context at the hard ceiling.
    #[serde(with = "humantime_serde", default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,
    /// Interval between maintainer replenishment passes.
    #[serde(with = "humantime_serde", default = "default_maintain_interval")]
    pub maintain_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            warm_target: default_warm_target(),
            max_age: default_pool_max_age(),
            acquire_timeout: default_acquire_timeout(),
            maintain_interval: default_maintain_interval(),
        }
    }
}

fn default_warm_target() -> usize {
    2
}
fn default_pool_max_age() -> Duration {
    Duration::from_secs(1800)
}
fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_maintain_interval() -> Duration {
    Duration::from_secs(10)
}

/// Result cache settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    /// LRU bound on cached extraction results.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Freshness window of a cached result.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl: default_cache_ttl(),
        }
    }
}

fn default_cache_capacity() -> usize {
    512
}
fn default_cache_ttl() -> Duration {
    Duration::from_secs(30)
}

/// Browser launch settings applied to every context.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

fn default_headless() -> bool {
    true
}
fn default_viewport_width() -> u32 {
    1280
}
fn default_viewport_height() -> u32 {
    720
}

/// Input-handling policy.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Accept URL schemes beyond http/https (javascript: stays rejected).
    #[serde(default)]
    pub allow_non_http_urls: bool,
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9464
}

/// The full server configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret required in the first frame of every connection.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8765
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            log_level: default_log_level(),
            tls: TlsConfig::default(),
            limits: LimitsConfig::default(),
            session: SessionConfig::default(),
            pool: PoolConfig::default(),
            cache: CacheConfig::default(),
            browser: BrowserConfig::default(),
            security: SecurityConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field sanity checks, run at load and at state initialization.
    pub fn validate(&self) -> Result<()> {
        if self.session.hard_ceiling == 0 {
            return Err(anyhow!("session.hard_ceiling must be at least 1"));
        }
        if self.pool.warm_target > self.session.hard_ceiling {
            return Err(anyhow!(
                "pool.warm_target ({}) must not exceed session.hard_ceiling ({})",
                self.pool.warm_target,
                self.session.hard_ceiling
            ));
        }
        if self.session.default_command_timeout_ms == 0 {
            return Err(anyhow!("session.default_command_timeout_ms must be positive"));
        }
        if self.session.default_command_timeout_ms > self.session.max_command_timeout_ms {
            return Err(anyhow!(
                "session.default_command_timeout_ms exceeds session.max_command_timeout_ms"
            ));
        }
        if self.limits.rate_limit_per_minute == 0 {
            return Err(anyhow!("limits.rate_limit_per_minute must be at least 1"));
        }
        if self.cache.capacity == 0 {
            return Err(anyhow!("cache.capacity must be at least 1"));
        }
        if let Some(key) = &self.api_key {
            if key.len() < 16 {
                return Err(anyhow!("api_key must be at least 16 characters"));
            }
        }
        if self.tls.enabled && (self.tls.cert_path.is_empty() || self.tls.key_path.is_empty()) {
            return Err(anyhow!("tls.cert_path and tls.key_path are required when TLS is enabled"));
        }
        Ok(())
    }
}
