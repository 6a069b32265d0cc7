// src/core/commands/session_ctl.rs

//! Session lifecycle and liveness commands. These are handled by the router
//! against the session manager rather than executed on a page.

use crate::core::commands::ResultPayload;
use crate::core::commands::command_trait::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::errors::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `session.create` command. Carries no method-specific fields; the
/// session inherits viewport and headless settings from server config.
#[derive(Debug, Clone, Default)]
pub struct SessionCreate;

impl ParseCommand for SessionCreate {
    fn parse(_params: &Map<String, Value>) -> Result<Self, GatewayError> {
        Ok(SessionCreate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreateResult {
    pub session_id: String,
}

/// The `session.close` command. The target session comes from the frame
/// envelope's `session_id`.
#[derive(Debug, Clone, Default)]
pub struct SessionClose;

impl ParseCommand for SessionClose {
    fn parse(_params: &Map<String, Value>) -> Result<Self, GatewayError> {
        Ok(SessionClose)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCloseResult {
    pub closed: bool,
}

/// The `ping` liveness command.
#[derive(Debug, Clone, Default)]
pub struct Ping;

impl ParseCommand for Ping {
    fn parse(_params: &Map<String, Value>) -> Result<Self, GatewayError> {
        Ok(Ping)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PongResult {
    pub pong: bool,
}

#[async_trait]
impl ExecutableCommand for SessionCreate {
    async fn execute(&self, _ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        Err(GatewayError::Internal(
            "session.create is handled by the router, not an executor".into(),
        ))
    }
}

#[async_trait]
impl ExecutableCommand for SessionClose {
    async fn execute(&self, _ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        Err(GatewayError::Internal(
            "session.close is handled by the router, not an executor".into(),
        ))
    }
}

#[async_trait]
impl ExecutableCommand for Ping {
    async fn execute(&self, _ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        Ok(ResultPayload::Pong(PongResult { pong: true }))
    }
}
