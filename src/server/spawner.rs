// src/server/spawner.rs

//! Spawns the server's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::tasks::pool_maintainer::PoolMaintainer;
use crate::core::tasks::reaper::SessionReaper;
use anyhow::Result;
use tracing::info;

/// Spawns all background tasks into the context's JoinSet.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    let metrics_enabled = state.config.lock().await.metrics.enabled;
    if metrics_enabled {
        let metrics_state = state.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_state, shutdown_rx).await;
            Ok(())
        });
    } else {
        info!("prometheus metrics server is disabled in the configuration");
    }

    let reaper = SessionReaper::new(state.clone());
    let shutdown_rx = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        reaper.run(shutdown_rx).await;
        Ok(())
    });

    let maintainer = PoolMaintainer::new(state.clone());
    let shutdown_rx = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        maintainer.run(shutdown_rx).await;
        Ok(())
    });

    info!("all background tasks have been spawned");
    Ok(())
}
