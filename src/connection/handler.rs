// src/connection/handler.rs

//! `ConnectionHandler`: the full lifecycle of one client WebSocket.
//!
//! The handler runs the receive loop; a dedicated writer task owns the sink
//! side and drains a reply queue, so pipelined commands reply as their
//! session workers finish without the read loop waiting on any of them.

use super::guard::ConnectionGuard;
use super::session::ConnectionState;
use crate::core::errors::GatewayError;
use crate::core::handler::pipeline::auth;
use crate::core::handler::{RouteOutcome, Router};
use crate::core::protocol::{ReplyFrame, RequestFrame};
use crate::core::sessions::ExecutedCommand;
use crate::core::state::{ClientBinding, ServerState};
use crate::server::GatewayStream;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};
use tracing::{debug, error, warn};

const REPLY_QUEUE_DEPTH: usize = 64;

/// Wrong or missing secrets are answered after a short delay, then the
/// connection closes.
const AUTH_FAILURE_DELAY: Duration = Duration::from_millis(250);

/// How long pending replies may drain after the receive loop ends.
const REPLY_DRAIN_GRACE: Duration = Duration::from_secs(5);

enum NextAction {
    Continue,
    CloseConnection,
}

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler {
    stream: Option<GatewayStream>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    connection_id: u64,
    shutdown_rx: broadcast::Receiver<()>,
    global_shutdown_rx: broadcast::Receiver<()>,
    conn: ConnectionState,
    required_key: Option<String>,
    max_malformed: u32,
    disconnect_grace: Duration,
    router: Option<Router>,
}

impl ConnectionHandler {
    pub async fn new(
        stream: GatewayStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        connection_id: u64,
        shutdown_rx: broadcast::Receiver<()>,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let (required_key, max_malformed, disconnect_grace) = {
            let config = state.config.lock().await;
            (
                config.api_key.clone(),
                config.limits.max_malformed_frames,
                config.session.disconnect_grace,
            )
        };
        Self {
            stream: Some(stream),
            addr,
            state,
            connection_id,
            shutdown_rx,
            global_shutdown_rx,
            conn: ConnectionState::new(required_key.is_some()),
            required_key,
            max_malformed,
            disconnect_grace,
            router: None,
        }
    }

    /// The main event loop: WebSocket handshake, then frames until the peer
    /// leaves, a shutdown arrives, or the connection misbehaves.
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        let _guard = ConnectionGuard::new(
            self.state.clone(),
            self.connection_id,
            self.addr,
            self.disconnect_grace,
        );

        let stream = self
            .stream
            .take()
            .ok_or_else(|| GatewayError::Internal("connection handler reused".into()))?;
        let ws = accept_async(stream)
            .await
            .map_err(|e| GatewayError::Internal(format!("websocket handshake failed: {e}")))?;
        let (sink, mut frames) = ws.split();

        let (reply_tx, reply_rx) = mpsc::channel::<ReplyFrame>(REPLY_QUEUE_DEPTH);
        let mut writer = tokio::spawn(write_replies(sink, reply_rx));

        'main_loop: loop {
            tokio::select! {
                // Prioritize shutdown signals over traffic.
                biased;
                _ = self.global_shutdown_rx.recv() => {
                    debug!(addr = %self.addr, "connection closing on server shutdown");
                    break 'main_loop;
                }
                _ = self.shutdown_rx.recv() => {
                    debug!(addr = %self.addr, "connection received kill signal");
                    break 'main_loop;
                }
                incoming = frames.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match self.process_frame(&text, &reply_tx).await {
                                NextAction::Continue => {}
                                NextAction::CloseConnection => break 'main_loop,
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            if self.reject_malformed("binary frames are not part of the protocol", &reply_tx).await {
                                break 'main_loop;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            debug!(addr = %self.addr, "peer closed the connection");
                            break 'main_loop;
                        }
                        // Ping/pong is handled by the websocket layer.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(addr = %self.addr, error = %e, "connection error");
                            break 'main_loop;
                        }
                        None => {
                            debug!(addr = %self.addr, "connection closed by peer");
                            break 'main_loop;
                        }
                    }
                }
            }
        }

        // Let in-flight commands deliver their replies, then stop writing.
        drop(reply_tx);
        if tokio::time::timeout(REPLY_DRAIN_GRACE, &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }
        Ok(())
    }

    async fn process_frame(
        &mut self,
        text: &str,
        reply_tx: &mpsc::Sender<ReplyFrame>,
    ) -> NextAction {
        if let Some(entry) = self.state.connections.get(&self.connection_id) {
            entry.value().0.lock().last_frame_time = std::time::Instant::now();
        }

        let frame = match RequestFrame::decode(text) {
            Ok(frame) => {
                self.conn.malformed_streak = 0;
                frame
            }
            Err(e) => {
                let id = salvage_request_id(text);
                self.state.stats.increment_total_failures();
                let _ = reply_tx.send(ReplyFrame::failure(&id, 0, &e)).await;
                if self.bump_malformed() {
                    return NextAction::CloseConnection;
                }
                return NextAction::Continue;
            }
        };

        // Authentication gate: the first frame must carry the secret. An
        // unauthenticated connection never reaches the router.
        if !self.conn.authenticated {
            let required = self.required_key.as_deref().unwrap_or_default();
            let presented = frame.api_key.as_deref().unwrap_or_default();
            if auth::verify_api_key(required, presented) {
                self.conn.authenticated = true;
            } else {
                warn!(addr = %self.addr, "authentication failed; closing connection");
                let _ = reply_tx
                    .send(ReplyFrame::failure(&frame.id, 0, &GatewayError::AuthFailed))
                    .await;
                tokio::time::sleep(AUTH_FAILURE_DELAY).await;
                return NextAction::CloseConnection;
            }
        }

        if self.router.is_none() {
            self.bind_client(&frame);
        }
        let Some(router) = self.router.as_ref() else {
            return NextAction::Continue;
        };

        let request_id = frame.id.clone();
        match router.route(frame).await {
            Ok(RouteOutcome::Immediate(reply)) => {
                if !reply.success {
                    self.state.stats.increment_total_failures();
                }
                let _ = reply_tx.send(reply).await;
            }
            Ok(RouteOutcome::Pending { request_id, reply }) => {
                let tx = reply_tx.clone();
                let state = self.state.clone();
                tokio::spawn(async move {
                    let frame = match reply.await {
                        Ok(executed) => assemble_reply(&request_id, executed),
                        Err(_) => ReplyFrame::failure(
                            &request_id,
                            0,
                            &GatewayError::SessionNotFound("session closed".to_string()),
                        ),
                    };
                    if !frame.success {
                        state.stats.increment_total_failures();
                    }
                    let _ = tx.send(frame).await;
                });
            }
            Err(e) => {
                self.state.stats.increment_total_failures();
                crate::core::metrics::COMMANDS_FAILED_TOTAL.inc();
                let _ = reply_tx
                    .send(ReplyFrame::failure(&request_id, 0, &e))
                    .await;
            }
        }
        NextAction::Continue
    }

    /// Resolves this connection's client identity from the first good frame
    /// and registers the binding.
    fn bind_client(&mut self, frame: &RequestFrame) {
        let client_id = frame
            .client_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if let Some(entry) = self.state.connections.get(&self.connection_id) {
            let (info, _) = entry.value();
            info.lock().client_id = Some(client_id.clone());
        }
        self.state
            .clients
            .entry(client_id.clone())
            .and_modify(|binding| binding.active_connections += 1)
            .or_insert_with(ClientBinding::new);

        debug!(addr = %self.addr, client = %client_id, "client bound");
        self.router = Some(Router::new(
            self.state.clone(),
            client_id,
            self.addr,
        ));
    }

    async fn reject_malformed(
        &mut self,
        reason: &str,
        reply_tx: &mpsc::Sender<ReplyFrame>,
    ) -> bool {
        self.state.stats.increment_total_failures();
        let error = GatewayError::InvalidCommand(reason.to_string());
        let _ = reply_tx.send(ReplyFrame::failure("", 0, &error)).await;
        self.bump_malformed()
    }

    /// Returns true when the consecutive-malformed threshold is crossed.
    fn bump_malformed(&mut self) -> bool {
        self.conn.malformed_streak += 1;
        if self.conn.malformed_streak >= self.max_malformed {
            warn!(
                addr = %self.addr,
                streak = self.conn.malformed_streak,
                "closing connection after consecutive malformed frames"
            );
            return true;
        }
        false
    }
}

/// Owns the sink half and drains the reply queue in order of completion.
async fn write_replies(
    mut sink: SplitSink<WebSocketStream<GatewayStream>, Message>,
    mut replies: mpsc::Receiver<ReplyFrame>,
) {
    while let Some(frame) = replies.recv().await {
        if sink.send(Message::text(frame.encode())).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Builds the reply for a command completed by a session worker. Internal
/// failures are logged in full here and surfaced generically.
fn assemble_reply(request_id: &str, executed: ExecutedCommand) -> ReplyFrame {
    match executed.outcome {
        Ok(outcome) => ReplyFrame::ok(
            request_id,
            executed.execution_ms,
            &outcome.payload,
            outcome.diff.as_ref(),
        ),
        Err(e) => {
            if e.error_type() == "internal" {
                error!(request = %request_id, error = %e, "command failed internally");
            }
            ReplyFrame::failure(request_id, executed.execution_ms, &e)
        }
    }
}

/// Best-effort recovery of the request id from an undecodable frame, so the
/// failure reply can still be correlated.
fn salvage_request_id(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("id").and_then(|id| id.as_str().map(str::to_string)))
        .unwrap_or_default()
}
