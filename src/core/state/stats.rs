// src/core/state/stats.rs

//! Server-wide statistics counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters reported via `/metrics` and logged at shutdown.
#[derive(Debug, Default)]
pub struct StatsState {
    total_connections: AtomicU64,
    total_commands: AtomicU64,
    total_failures: AtomicU64,
}

impl StatsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn increment_total_commands(&self) {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_commands(&self) -> u64 {
        self.total_commands.load(Ordering::Relaxed)
    }

    pub fn increment_total_failures(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }
}
