// src/core/commands/navigate.rs

use crate::core::commands::ResultPayload;
use crate::core::commands::command_trait::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::commands::helpers::{opt_enum, opt_str, req_str};
use crate::core::errors::GatewayError;
use crate::driver::{DriverError, LifecycleEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `navigate` command: drive the session's page to a URL and wait for
/// the requested lifecycle milestone.
#[derive(Debug, Clone)]
pub struct Navigate {
    pub url: String,
    pub wait_until: LifecycleEvent,
    pub referer: Option<String>,
}

impl ParseCommand for Navigate {
    fn parse(params: &Map<String, Value>) -> Result<Self, GatewayError> {
        Ok(Navigate {
            url: req_str(params, "url")?,
            wait_until: opt_enum(params, "wait_until")?.unwrap_or_default(),
            referer: opt_str(params, "referer")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigateResult {
    /// Where the page actually landed.
    pub url: String,
    pub title: String,
    pub redirected: bool,
    pub wait_until: LifecycleEvent,
}

#[async_trait]
impl ExecutableCommand for Navigate {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        let outcome = ctx
            .page
            .navigate(&self.url, self.wait_until, self.referer.as_deref())
            .await
            .map_err(|e| match e {
                DriverError::Navigation(cause) => GatewayError::NavigationFailed(cause),
                other => GatewayError::NavigationFailed(other.to_string()),
            })?;
        let title = ctx
            .page
            .title()
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(ResultPayload::Navigate(NavigateResult {
            url: outcome.final_url,
            title,
            redirected: outcome.redirected,
            wait_until: self.wait_until,
        }))
    }
}
