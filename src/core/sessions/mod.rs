// src/core/sessions/mod.rs

//! Session creation, lookup, ownership enforcement and reaping.

mod session;
pub(crate) mod worker;

pub use session::Session;
pub use worker::{ExecutedCommand, ExecutionOutcome};

use crate::core::cache::ResultCache;
use crate::core::commands::Command;
use crate::core::errors::GatewayError;
use crate::core::metrics;
use crate::core::pool::ContextPool;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use worker::{SessionJob, WorkerContext};

/// Commands queued per session before enqueue backpressures the connection.
const COMMAND_QUEUE_DEPTH: usize = 32;

/// Timeout clamps applied to every command.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    pub default_ms: u64,
    pub max_ms: u64,
}

impl TimeoutPolicy {
    /// Resolves a client-requested timeout against the policy ceiling.
    pub fn effective(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms.unwrap_or(self.default_ms).min(self.max_ms).max(1);
        Duration::from_millis(ms)
    }
}

/// Maps session id to session record and owns the per-session workers.
pub struct SessionManager {
    table: Arc<DashMap<String, Arc<Session>>>,
    pool: Arc<ContextPool>,
    cache: Arc<ResultCache>,
    timeouts: TimeoutPolicy,
}

impl SessionManager {
    pub fn new(pool: Arc<ContextPool>, cache: Arc<ResultCache>, timeouts: TimeoutPolicy) -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            pool,
            cache,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> TimeoutPolicy {
        self.timeouts
    }

    /// Creates a session for `client_id`: a pooled context, one page, a
    /// dedicated worker. Fails fast with resource exhaustion at the pool's
    /// hard ceiling.
    pub async fn create(&self, client_id: &str) -> Result<Arc<Session>, GatewayError> {
        let context = self.pool.acquire().await?;
        let page = context
            .handle()
            .new_page()
            .await
            .map_err(|e| GatewayError::Internal(format!("failed to open page: {e}")))?;

        let id = new_session_id()?;
        let (jobs_tx, jobs_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let session = Arc::new(Session::new(
            id.clone(),
            client_id.to_string(),
            page,
            jobs_tx,
        ));

        self.table.insert(id.clone(), session.clone());
        metrics::ACTIVE_SESSIONS.inc();
        info!(session = %id, client = %client_id, "session created");

        tokio::spawn(worker::run(
            session.clone(),
            context,
            jobs_rx,
            WorkerContext {
                table: self.table.clone(),
                pool: self.pool.clone(),
                cache: self.cache.clone(),
            },
        ));

        Ok(session)
    }

    /// Looks a session up and enforces ownership: a session may be acted on
    /// only by its owning client.
    pub fn resolve(&self, session_id: &str, client_id: &str) -> Result<Arc<Session>, GatewayError> {
        let session = self
            .table
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?;
        if session.client_id != client_id {
            return Err(GatewayError::SessionNotOwned(session_id.to_string()));
        }
        Ok(session)
    }

    /// Resolves the target session of a command frame: an explicit id must
    /// exist and be owned; with no id, the client's existing session is
    /// reused or a fresh one is created.
    pub async fn resolve_or_create(
        &self,
        client_id: &str,
        session_id: Option<&str>,
    ) -> Result<Arc<Session>, GatewayError> {
        match session_id {
            Some(id) => self.resolve(id, client_id),
            None => {
                if let Some(existing) = self.owned_by(client_id).into_iter().next() {
                    return Ok(existing);
                }
                self.create(client_id).await
            }
        }
    }

    /// Enqueues a command on the session's worker. The receiver resolves
    /// when the command has executed in arrival order.
    pub async fn submit(
        &self,
        session: &Arc<Session>,
        command: Command,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<ExecutedCommand>, GatewayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        session
            .jobs
            .send(SessionJob::Execute {
                command,
                timeout,
                reply: reply_tx,
            })
            .await
            .map_err(|_| GatewayError::SessionNotFound(session.id.clone()))?;
        Ok(reply_rx)
    }

    /// Closes a session through its worker queue, preserving ordering with
    /// any commands already enqueued. `client_id` is `None` for internal
    /// callers (reaper, disconnect cleanup, shutdown).
    pub async fn close(
        &self,
        session_id: &str,
        client_id: Option<&str>,
    ) -> Result<oneshot::Receiver<ExecutedCommand>, GatewayError> {
        let session = match client_id {
            Some(client) => self.resolve(session_id, client)?,
            None => self
                .table
                .get(session_id)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?,
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        session
            .jobs
            .send(SessionJob::Close {
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| GatewayError::SessionNotFound(session_id.to_string()))?;
        Ok(reply_rx)
    }

    /// Sessions idle beyond `threshold`, for the reaper.
    pub fn idle_sessions(&self, threshold: Duration) -> Vec<Arc<Session>> {
        self.table
            .iter()
            .filter(|entry| entry.value().idle_for() > threshold)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn owned_by(&self, client_id: &str) -> Vec<Arc<Session>> {
        self.table
            .iter()
            .filter(|entry| entry.value().client_id == client_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.table.get(session_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Closes every session and waits for the workers to finish, bounded by
    /// `grace`. Used during graceful shutdown.
    pub async fn close_all(&self, grace: Duration) {
        let ids: Vec<String> = self.table.iter().map(|e| e.key().clone()).collect();
        let mut receivers = Vec::new();
        for id in ids {
            if let Ok(rx) = self.close(&id, None).await {
                receivers.push(rx);
            }
        }
        let drain = async {
            for rx in receivers {
                let _ = rx.await;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!("timed out waiting for sessions to close");
        }
    }
}

/// 128 bits of randomness, hex encoded: unique and unguessable.
fn new_session_id() -> Result<String, GatewayError> {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes).map_err(|e| GatewayError::Internal(e.to_string()))?;
    Ok(hex::encode(bytes))
}
