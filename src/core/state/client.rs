// src/core/state/client.rs

//! State definitions for transport connections and client bindings.
//!
//! A *connection* is one WebSocket; a *client* is the identity commands are
//! attributed to (rate limits, session ownership). A client may reconnect
//! within the disconnect grace period and keep its sessions.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

pub type ShutdownSender = broadcast::Sender<()>;
pub type ConnectionStateTuple = (Arc<Mutex<ConnectionInfo>>, ShutdownSender);
pub type ConnectionMap = Arc<DashMap<u64, ConnectionStateTuple>>;
pub type ClientMap = Arc<DashMap<String, ClientBinding>>;

#[derive(Debug)]
pub struct ConnectionInfo {
    pub addr: SocketAddr,
    pub connection_id: u64,
    /// Set once the first frame resolved an identity.
    pub client_id: Option<String>,
    pub created: Instant,
    pub last_frame_time: Instant,
}

/// Aggregate view of one client identity across its connections.
#[derive(Debug)]
pub struct ClientBinding {
    pub active_connections: usize,
    pub first_seen: Instant,
}

impl ClientBinding {
    pub fn new() -> Self {
        Self {
            active_connections: 1,
            first_seen: Instant::now(),
        }
    }
}

impl Default for ClientBinding {
    fn default() -> Self {
        Self::new()
    }
}
