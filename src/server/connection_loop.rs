// src/server/connection_loop.rs

//! The main accept loop and the graceful shutdown sequence.

use super::context::ServerContext;
use super::stream::GatewayStream;
use crate::connection::ConnectionHandler;
use crate::core::metrics;
use crate::core::state::ConnectionInfo;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
#[cfg(windows)]
use tokio::signal;

/// Waits for SIGINT/SIGTERM (Unix) or Ctrl+C (Windows).
async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGINT handler: {e}");
                std::future::pending::<()>().await;
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
                return;
            }
        };
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
        }
    }

    #[cfg(windows)]
    {
        if signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, initiating graceful shutdown");
        }
    }
}

/// Accepts connections until shutdown, then drains.
pub async fn run(mut ctx: ServerContext) {
    let mut connection_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => {
                break;
            },

            // A failed background task is fatal: the gateway cannot meet its
            // guarantees without the reaper or maintainer.
            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => info!("a background task completed"),
                    Ok(Err(e)) => { error!("CRITICAL: background task failed: {e}; shutting down"); break; }
                    Err(e) => { error!("CRITICAL: background task panicked: {e:?}; shutting down"); break; }
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
                            warn!(%addr, "connection refused: client limit reached");
                            continue;
                        };
                        debug!(%addr, "accepted new connection");
                        ctx.state.stats.increment_total_connections();
                        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
                        metrics::CONNECTED_CLIENTS.inc();

                        connection_id_counter = connection_id_counter.wrapping_add(1);
                        let connection_id = connection_id_counter;
                        let state = ctx.state.clone();

                        let (conn_shutdown_tx, conn_shutdown_rx) = broadcast::channel(1);
                        let global_shutdown_rx = ctx.shutdown_tx.subscribe();

                        let info = Arc::new(parking_lot::Mutex::new(ConnectionInfo {
                            addr,
                            connection_id,
                            client_id: None,
                            created: Instant::now(),
                            last_frame_time: Instant::now(),
                        }));
                        state.connections.insert(connection_id, (info, conn_shutdown_tx));

                        let acceptor = ctx.acceptor.clone();
                        client_tasks.spawn(async move {
                            let _permit = permit;
                            let stream = match acceptor {
                                Some(acceptor) => match acceptor.accept(socket).await {
                                    Ok(tls) => GatewayStream::Tls(Box::new(tls)),
                                    Err(e) => {
                                        warn!(%addr, error = %e, "TLS handshake failed");
                                        state.connections.remove(&connection_id);
                                        metrics::CONNECTED_CLIENTS.dec();
                                        return;
                                    }
                                },
                                None => GatewayStream::Tcp(socket),
                            };
                            let mut handler = ConnectionHandler::new(
                                stream, addr, state, connection_id,
                                conn_shutdown_rx, global_shutdown_rx,
                            ).await;
                            if let Err(e) = handler.run().await {
                                warn!(%addr, error = %e, "connection terminated unexpectedly");
                            }
                        });
                    }
                    Err(e) => error!("failed to accept connection: {e}"),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("a connection handler panicked: {e:?}");
                    }
                }
            },
        }
    }

    // --- Graceful shutdown sequence ---
    info!("shutting down; signaling all tasks");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("no tasks were listening for shutdown");
    }

    client_tasks.shutdown().await;
    info!("all client connections closed");

    let shutdown_grace = {
        let config = ctx.state.config.lock().await;
        config.session.shutdown_grace
    };
    ctx.state.sessions.close_all(shutdown_grace).await;
    info!("all sessions closed");

    ctx.state.pool.drain().await;
    info!("browser context pool drained");

    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("timed out waiting for background tasks to finish cleanly");
    }

    info!(
        connections = ctx.state.stats.get_total_connections(),
        commands = ctx.state.stats.get_total_commands(),
        "server shutdown complete"
    );
}
