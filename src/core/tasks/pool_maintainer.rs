// src/core/tasks/pool_maintainer.rs

//! Keeps the browser-context pool at its warm target.

use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct PoolMaintainer {
    state: Arc<ServerState>,
}

impl PoolMaintainer {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let interval = {
            let config = self.state.config.lock().await;
            config.pool.maintain_interval
        };
        info!(
            interval_secs = interval.as_secs(),
            "pool maintainer started"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.state.pool.maintain().await;
                }
                _ = shutdown_rx.recv() => {
                    debug!("pool maintainer shutting down");
                    break;
                }
            }
        }
    }
}
