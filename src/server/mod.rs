// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, reload};

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;
mod stream;

pub use stream::GatewayStream;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(
    config: Config,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<()> {
    // 1. Initialize server state, TLS, the warm pool and the listener.
    let mut server_context = initialization::setup(config, log_reload_handle).await?;

    // 2. Spawn background tasks (reaper, pool maintainer, metrics).
    spawner::spawn_all(&mut server_context).await?;

    // 3. Run the accept loop until shutdown.
    connection_loop::run(server_context).await;

    Ok(())
}
