// src/core/commands/fill.rs

use crate::core::commands::ResultPayload;
use crate::core::commands::command_trait::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::commands::helpers::{opt_bool, opt_u64, req_str};
use crate::core::errors::GatewayError;
use crate::driver::{DriverError, ReadTarget, TypePlan};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `fill` command: type text into an input-like element.
#[derive(Debug, Clone)]
pub struct Fill {
    pub selector: String,
    pub text: String,
    pub clear_first: bool,
    pub typing_delay_ms: Option<u64>,
    pub press_enter: bool,
    /// Re-read the element value after typing and report whether it matches.
    pub validate_after: bool,
}

impl ParseCommand for Fill {
    fn parse(params: &Map<String, Value>) -> Result<Self, GatewayError> {
        Ok(Fill {
            selector: req_str(params, "selector")?,
            text: req_str(params, "text")?,
            clear_first: opt_bool(params, "clear_first", true)?,
            typing_delay_ms: opt_u64(params, "typing_delay_ms")?,
            press_enter: opt_bool(params, "press_enter", false)?,
            validate_after: opt_bool(params, "validate_after", false)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillResult {
    pub selector: String,
    pub previous_value: String,
    pub current_value: String,
    /// `Some(false)` means a post-fill read did not see the intended text.
    /// That is reported, not treated as a command failure.
    pub validated: Option<bool>,
}

impl Fill {
    async fn read_value(&self, ctx: &ExecutionContext) -> Result<String, GatewayError> {
        let nodes = ctx
            .page
            .read(&self.selector, &ReadTarget::Property("value".to_string()), false)
            .await
            .map_err(|e| match e {
                DriverError::NotFound => GatewayError::ElementNotFound,
                other => GatewayError::Internal(other.to_string()),
            })?;
        Ok(nodes
            .first()
            .and_then(|n| n.value.as_str().map(str::to_string))
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExecutableCommand for Fill {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        let info = ctx
            .page
            .query(&self.selector)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or(GatewayError::ElementNotFound)?;
        if !info.editable {
            return Err(GatewayError::ElementNotInteractable);
        }

        let previous_value = self.read_value(ctx).await?;

        let plan = TypePlan {
            clear_first: self.clear_first,
            delay_ms: self.typing_delay_ms,
            press_enter: self.press_enter,
        };
        ctx.page
            .fill(&self.selector, &self.text, &plan)
            .await
            .map_err(|e| match e {
                DriverError::NotFound => GatewayError::ElementNotFound,
                other => GatewayError::Internal(other.to_string()),
            })?;

        let intended = if self.clear_first {
            self.text.clone()
        } else {
            format!("{previous_value}{}", self.text)
        };

        let (current_value, validated) = if self.validate_after {
            let observed = self.read_value(ctx).await?;
            let matches = observed == intended;
            (observed, Some(matches))
        } else {
            (intended, None)
        };

        Ok(ResultPayload::Fill(FillResult {
            selector: self.selector.clone(),
            previous_value,
            current_value,
            validated,
        }))
    }
}
