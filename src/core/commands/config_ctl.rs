// src/core/commands/config_ctl.rs

//! The `config.set` control command: runtime adjustment of operational
//! knobs. Handled by the router against server state rather than executed on
//! a page. Only parameters with a live runtime effect are accepted;
//! currently that is `log_level`, which reloads the tracing filter.

use crate::core::commands::ResultPayload;
use crate::core::commands::command_trait::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::commands::helpers::req_str;
use crate::core::errors::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct ConfigSet {
    pub parameter: String,
    pub value: String,
}

impl ParseCommand for ConfigSet {
    fn parse(params: &Map<String, Value>) -> Result<Self, GatewayError> {
        Ok(ConfigSet {
            parameter: req_str(params, "parameter")?,
            value: req_str(params, "value")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSetResult {
    pub parameter: String,
    pub applied: bool,
}

#[async_trait]
impl ExecutableCommand for ConfigSet {
    async fn execute(&self, _ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        Err(GatewayError::Internal(
            "config.set is handled by the router, not an executor".into(),
        ))
    }
}
