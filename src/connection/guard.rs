// src/connection/guard.rs

//! `ConnectionGuard`, an RAII guard for connection resource cleanup.

use crate::core::metrics;
use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Ensures connection resources are released however the handler exits.
///
/// Dropping the guard unregisters the connection and, when it was the
/// client's last connection, starts the disconnect grace timer: if the
/// client has not reconnected when it fires, its sessions are closed and its
/// limiter state is forgotten.
pub struct ConnectionGuard {
    state: Arc<ServerState>,
    connection_id: u64,
    addr: SocketAddr,
    disconnect_grace: Duration,
}

impl ConnectionGuard {
    pub(crate) fn new(
        state: Arc<ServerState>,
        connection_id: u64,
        addr: SocketAddr,
        disconnect_grace: Duration,
    ) -> Self {
        Self {
            state,
            connection_id,
            addr,
            disconnect_grace,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        debug!(addr = %self.addr, "cleaning up connection resources");

        let client_id = self
            .state
            .connections
            .remove(&self.connection_id)
            .and_then(|(_, (info, _))| info.lock().client_id.clone());

        let Some(client_id) = client_id else {
            return;
        };

        let last_connection = match self.state.clients.get_mut(&client_id) {
            Some(mut binding) => {
                binding.active_connections = binding.active_connections.saturating_sub(1);
                binding.active_connections == 0
            }
            None => false,
        };
        if !last_connection {
            return;
        }

        let state = self.state.clone();
        let grace = self.disconnect_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let reconnected = state
                .clients
                .get(&client_id)
                .is_some_and(|b| b.active_connections > 0);
            if reconnected {
                return;
            }
            state.clients.remove(&client_id);
            state.limiter.forget(&client_id);
            let owned = state.sessions.owned_by(&client_id);
            if !owned.is_empty() {
                info!(
                    client = %client_id,
                    sessions = owned.len(),
                    "disconnect grace expired; closing client sessions"
                );
            }
            for session in owned {
                let _ = state.sessions.close(&session.id, None).await;
            }
        });
    }
}
