// src/core/handler/command_router.rs

//! Routes decoded request frames through the processing pipeline and on to
//! the session workers.
//!
//! The router runs on the connection's read loop. Control commands (ping,
//! session lifecycle) complete here; page commands are enqueued on their
//! session's worker and resolve later, so one slow command never stalls
//! commands for other sessions on the same connection.

use crate::core::commands::{
    Command, ConfigSet, ConfigSetResult, PongResult, ResultPayload, SessionCreateResult,
};
use crate::core::errors::GatewayError;
use crate::core::handler::pipeline::{admission, screen};
use crate::core::metrics;
use crate::core::protocol::{ReplyFrame, RequestFrame};
use crate::core::sessions::ExecutedCommand;
use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use tracing_subscriber::filter::EnvFilter;

/// What routing one frame produced.
pub enum RouteOutcome {
    /// The reply is ready now.
    Immediate(ReplyFrame),
    /// The command is queued on a session worker; the reply arrives on the
    /// receiver in per-session arrival order.
    Pending {
        request_id: String,
        reply: oneshot::Receiver<ExecutedCommand>,
    },
}

/// Per-connection router, bound to one resolved client identity.
pub struct Router {
    state: Arc<ServerState>,
    client_id: String,
    addr: SocketAddr,
}

impl Router {
    pub fn new(state: Arc<ServerState>, client_id: String, addr: SocketAddr) -> Self {
        Self {
            state,
            client_id,
            addr,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Runs the pipeline for one frame: admission, screening, typing, then
    /// dispatch. Any error here becomes a failure reply; the connection
    /// stays up.
    pub async fn route(&self, mut frame: RequestFrame) -> Result<RouteOutcome, GatewayError> {
        self.state.stats.increment_total_commands();

        admission::check_admission(&self.state, &self.client_id)?;
        screen::screen_params(&self.state.sanitizer, &mut frame.params)?;
        let command = Command::parse(&frame.method, &frame.params)?;
        debug!(
            method = %command.name(),
            client = %self.client_id,
            addr = %self.addr,
            "routing command"
        );

        let timeout = self.state.sessions.timeouts().effective(frame.timeout_ms);

        match command {
            Command::Ping(_) => {
                metrics::COMMANDS_PROCESSED_TOTAL.inc();
                Ok(RouteOutcome::Immediate(ReplyFrame::ok(
                    &frame.id,
                    0,
                    &ResultPayload::Pong(PongResult { pong: true }),
                    None,
                )))
            }
            Command::SessionCreate(_) => {
                metrics::COMMANDS_PROCESSED_TOTAL.inc();
                let started = Instant::now();
                let session = self.state.sessions.create(&self.client_id).await?;
                Ok(RouteOutcome::Immediate(ReplyFrame::ok(
                    &frame.id,
                    started.elapsed().as_millis() as u64,
                    &ResultPayload::SessionCreate(SessionCreateResult {
                        session_id: session.id.clone(),
                    }),
                    None,
                )))
            }
            Command::ConfigSet(cmd) => {
                metrics::COMMANDS_PROCESSED_TOTAL.inc();
                self.apply_config_set(&cmd).await?;
                Ok(RouteOutcome::Immediate(ReplyFrame::ok(
                    &frame.id,
                    0,
                    &ResultPayload::ConfigSet(ConfigSetResult {
                        parameter: cmd.parameter,
                        applied: true,
                    }),
                    None,
                )))
            }
            Command::SessionClose(_) => {
                metrics::COMMANDS_PROCESSED_TOTAL.inc();
                let session_id = frame
                    .session_id()
                    .ok_or(GatewayError::MissingField("session_id"))?;
                let reply = self
                    .state
                    .sessions
                    .close(session_id, Some(&self.client_id))
                    .await?;
                Ok(RouteOutcome::Pending {
                    request_id: frame.id.clone(),
                    reply,
                })
            }
            command => {
                let session = self
                    .state
                    .sessions
                    .resolve_or_create(&self.client_id, frame.session_id())
                    .await?;
                let reply = self
                    .state
                    .sessions
                    .submit(&session, command, timeout)
                    .await?;
                Ok(RouteOutcome::Pending {
                    request_id: frame.id.clone(),
                    reply,
                })
            }
        }
    }

    /// Applies a runtime configuration change. Only parameters with a live
    /// effect are supported; the one such knob today is `log_level`, which
    /// swaps the tracing filter through the reload handle.
    async fn apply_config_set(&self, cmd: &ConfigSet) -> Result<(), GatewayError> {
        match cmd.parameter.as_str() {
            "log_level" => {
                let new_filter = EnvFilter::try_new(&cmd.value).map_err(|e| {
                    GatewayError::InvalidCommand(format!("invalid log filter directive: {e}"))
                })?;
                if let Err(e) = self.state.log_reload_handle.reload(new_filter) {
                    error!("failed to reload log level: {e}");
                    return Err(GatewayError::Internal(format!(
                        "failed to reload log level: {e}"
                    )));
                }
                self.state.config.lock().await.log_level = cmd.value.clone();
                info!(level = %cmd.value, client = %self.client_id, "log level dynamically changed");
                Ok(())
            }
            other => Err(GatewayError::InvalidCommand(format!(
                "unsupported config.set parameter '{other}'"
            ))),
        }
    }
}
