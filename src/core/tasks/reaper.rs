// src/core/tasks/reaper.rs

//! The idle-session reaper.

use crate::core::metrics;
use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Scans the session table on a fixed interval and closes sessions whose
/// last activity is older than the idle threshold. Because workers touch
/// last-activity at command entry, a session in the middle of a long command
/// never looks idle.
pub struct SessionReaper {
    state: Arc<ServerState>,
}

impl SessionReaper {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let (interval, idle_threshold) = {
            let config = self.state.config.lock().await;
            (config.session.reap_interval, config.session.idle_timeout)
        };
        info!(
            interval_secs = interval.as_secs(),
            idle_secs = idle_threshold.as_secs(),
            "session reaper started"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reap(idle_threshold).await;
                    // Piggyback: drop singleflight markers nobody waits on.
                    self.state.cache.sweep_inflight();
                }
                _ = shutdown_rx.recv() => {
                    debug!("session reaper shutting down");
                    break;
                }
            }
        }
    }

    async fn reap(&self, idle_threshold: Duration) {
        let idle = self.state.sessions.idle_sessions(idle_threshold);
        for session in idle {
            info!(
                session = %session.id,
                client = %session.client_id,
                idle_secs = session.idle_for().as_secs(),
                "reaping idle session"
            );
            if self.state.sessions.close(&session.id, None).await.is_ok() {
                metrics::SESSIONS_REAPED_TOTAL.inc();
            }
        }
    }
}
