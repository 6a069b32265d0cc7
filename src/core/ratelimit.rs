// src/core/ratelimit.rs

//! Per-client sliding-window admission control.
//!
//! Each client identifier keeps a log of admission timestamps younger than
//! the window; an admission succeeds iff the log holds fewer than the quota.
//! Old timestamps are pruned lazily on access, which bounds memory per client
//! by the quota itself. A client that keeps hammering a full window is placed
//! in a cool-off block.

use crate::core::errors::GatewayError;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// The fixed admission window. The quota is expressed as "N per minute".
const ADMISSION_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct ClientWindow {
    admissions: VecDeque<Instant>,
    rejects: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

/// Sliding-window-log rate limiter, keyed by client identifier.
///
/// Per-client state lives in a `DashMap` shard entry, so disjoint clients
/// never contend on a common lock.
#[derive(Debug)]
pub struct RateLimiter {
    quota: usize,
    block_threshold: u32,
    block_duration: Duration,
    reject_horizon: Duration,
    clients: DashMap<String, ClientWindow>,
}

impl RateLimiter {
    pub fn new(
        quota: usize,
        block_threshold: u32,
        block_duration: Duration,
        reject_horizon: Duration,
    ) -> Self {
        Self {
            quota,
            block_threshold,
            block_duration,
            reject_horizon,
            clients: DashMap::new(),
        }
    }

    /// Attempts to admit one command for `client_id` at the current instant.
    pub fn admit(&self, client_id: &str) -> Result<(), GatewayError> {
        self.admit_at(client_id, Instant::now())
    }

    /// Attempts an admission at an explicit instant. Split out so tests can
    /// drive the window deterministically.
    pub fn admit_at(&self, client_id: &str, now: Instant) -> Result<(), GatewayError> {
        let mut window = self.clients.entry(client_id.to_string()).or_default();

        if let Some(until) = window.blocked_until {
            if now < until {
                return Err(GatewayError::RateLimited);
            }
            window.blocked_until = None;
            window.rejects.clear();
        }

        while let Some(front) = window.admissions.front() {
            if now.duration_since(*front) >= ADMISSION_WINDOW {
                window.admissions.pop_front();
            } else {
                break;
            }
        }

        if window.admissions.len() < self.quota {
            window.admissions.push_back(now);
            return Ok(());
        }

        while let Some(front) = window.rejects.front() {
            if now.duration_since(*front) >= self.reject_horizon {
                window.rejects.pop_front();
            } else {
                break;
            }
        }
        window.rejects.push_back(now);
        crate::core::metrics::RATE_LIMITED_TOTAL.inc();

        if window.rejects.len() >= self.block_threshold as usize {
            window.blocked_until = Some(now + self.block_duration);
            window.rejects.clear();
            warn!(
                client = %client_id,
                cooloff_secs = self.block_duration.as_secs(),
                "client blocked after repeated rate-limit rejections"
            );
        }

        Err(GatewayError::RateLimited)
    }

    /// True if the client is currently serving a cool-off block.
    pub fn is_blocked(&self, client_id: &str, now: Instant) -> bool {
        self.clients
            .get(client_id)
            .and_then(|w| w.blocked_until)
            .is_some_and(|until| now < until)
    }

    /// Drops all state for a client; used when a client binding is retired.
    pub fn forget(&self, client_id: &str) {
        self.clients.remove(client_id);
    }
}
