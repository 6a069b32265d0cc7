// src/core/commands/click.rs

use crate::core::commands::ResultPayload;
use crate::core::commands::command_trait::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::commands::helpers::{opt_bool, opt_enum, opt_u64, req_str};
use crate::core::errors::GatewayError;
use crate::driver::{ClickOptions, DriverError, MouseButton, PagePoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `click` command.
#[derive(Debug, Clone)]
pub struct Click {
    pub selector: String,
    pub button: MouseButton,
    pub click_count: u32,
    /// Click even when the element is not considered visible.
    pub force: bool,
    /// Fractional position inside the element bounding box.
    pub position: Option<PagePoint>,
}

impl ParseCommand for Click {
    fn parse(params: &Map<String, Value>) -> Result<Self, GatewayError> {
        let click_count = opt_u64(params, "click_count")?.unwrap_or(1);
        if click_count == 0 {
            return Err(GatewayError::InvalidCommand(
                "field 'click_count' must be at least 1".to_string(),
            ));
        }
        let position = match params.get("position") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let point: PagePoint = serde_json::from_value(value.clone()).map_err(|_| {
                    GatewayError::InvalidCommand(
                        "field 'position' must be an object with numeric 'x' and 'y'".to_string(),
                    )
                })?;
                if !(0.0..=1.0).contains(&point.x) || !(0.0..=1.0).contains(&point.y) {
                    return Err(GatewayError::InvalidCommand(
                        "field 'position' coordinates must be fractions in [0, 1]".to_string(),
                    ));
                }
                Some(point)
            }
        };
        Ok(Click {
            selector: req_str(params, "selector")?,
            button: opt_enum(params, "button")?.unwrap_or_default(),
            click_count: click_count as u32,
            force: opt_bool(params, "force", false)?,
            position,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickResult {
    pub selector: String,
    /// The page coordinate the click landed on, resolved from the element
    /// bounding box.
    pub position: PagePoint,
    pub button: MouseButton,
    pub click_count: u32,
}

#[async_trait]
impl ExecutableCommand for Click {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        let info = ctx
            .page
            .query(&self.selector)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or(GatewayError::ElementNotFound)?;
        if !info.visible && !self.force {
            return Err(GatewayError::ElementNotVisible);
        }

        let opts = ClickOptions {
            button: self.button,
            click_count: self.click_count,
            position: self.position,
        };
        let position = ctx
            .page
            .click(&self.selector, &opts)
            .await
            .map_err(|e| match e {
                DriverError::NotFound => GatewayError::ElementNotFound,
                other => GatewayError::Internal(other.to_string()),
            })?;
        Ok(ResultPayload::Click(ClickResult {
            selector: self.selector.clone(),
            position,
            button: self.button,
            click_count: self.click_count,
        }))
    }
}
