// src/core/commands/wait.rs

use crate::core::commands::ResultPayload;
use crate::core::commands::command_trait::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::commands::helpers::{opt_str, opt_u64, req_enum};
use crate::core::errors::GatewayError;
use crate::driver::{LifecycleEvent, ReadTarget};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Slack kept between the wait loop's own budget and the hard command
/// deadline, so an unmet condition is reported instead of cancelled.
const DEADLINE_SLACK: Duration = Duration::from_millis(25);

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitCondition {
    Load,
    DomContentLoaded,
    NetworkIdle,
    Visible,
    Hidden,
    Attached,
    Detached,
    TextEquals,
    CustomScript,
}

impl WaitCondition {
    fn needs_selector(self) -> bool {
        matches!(
            self,
            WaitCondition::Visible
                | WaitCondition::Hidden
                | WaitCondition::Attached
                | WaitCondition::Detached
                | WaitCondition::TextEquals
        )
    }

    fn lifecycle(self) -> Option<LifecycleEvent> {
        match self {
            WaitCondition::Load => Some(LifecycleEvent::Load),
            WaitCondition::DomContentLoaded => Some(LifecycleEvent::DomContentLoaded),
            WaitCondition::NetworkIdle => Some(LifecycleEvent::NetworkIdle),
            _ => None,
        }
    }
}

/// The `wait` command. Read-only but never cached: its answer is a property
/// of a moment, not of the page.
#[derive(Debug, Clone)]
pub struct Wait {
    pub condition: WaitCondition,
    pub selector: Option<String>,
    pub expected_text: Option<String>,
    pub script: Option<String>,
    pub poll_interval_ms: u64,
}

impl ParseCommand for Wait {
    fn parse(params: &Map<String, Value>) -> Result<Self, GatewayError> {
        let condition: WaitCondition = req_enum(params, "condition")?;
        let selector = opt_str(params, "selector")?;
        let expected_text = opt_str(params, "expected_text")?;
        let script = opt_str(params, "script")?;

        if condition.needs_selector() && selector.is_none() {
            return Err(GatewayError::MissingField("selector"));
        }
        if condition == WaitCondition::TextEquals && expected_text.is_none() {
            return Err(GatewayError::MissingField("expected_text"));
        }
        if condition == WaitCondition::CustomScript && script.is_none() {
            return Err(GatewayError::MissingField("script"));
        }

        Ok(Wait {
            condition,
            selector,
            expected_text,
            script,
            poll_interval_ms: opt_u64(params, "poll_interval_ms")?
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                .max(1),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitResult {
    pub condition: WaitCondition,
    pub condition_met: bool,
    pub waited_ms: u64,
}

impl Wait {
    async fn condition_holds(&self, ctx: &ExecutionContext) -> Result<bool, GatewayError> {
        let selector = self.selector.as_deref().unwrap_or_default();
        match self.condition {
            WaitCondition::Load | WaitCondition::DomContentLoaded | WaitCondition::NetworkIdle => {
                // Lifecycle waits resolve when the milestone is reached; the
                // hard deadline cancels them otherwise.
                let event = self.condition.lifecycle().unwrap_or_default();
                ctx.page
                    .wait_for_lifecycle(event)
                    .await
                    .map_err(|e| GatewayError::Internal(e.to_string()))?;
                Ok(true)
            }
            WaitCondition::Visible => Ok(self
                .query_info(ctx, selector)
                .await?
                .is_some_and(|i| i.visible)),
            WaitCondition::Hidden => Ok(!self
                .query_info(ctx, selector)
                .await?
                .is_some_and(|i| i.visible)),
            WaitCondition::Attached => Ok(self.query_info(ctx, selector).await?.is_some()),
            WaitCondition::Detached => Ok(self.query_info(ctx, selector).await?.is_none()),
            WaitCondition::TextEquals => {
                let expected = self.expected_text.as_deref().unwrap_or_default();
                let observed = match ctx.page.read(selector, &ReadTarget::Text, false).await {
                    Ok(nodes) => nodes
                        .first()
                        .and_then(|n| n.value.as_str().map(str::to_string)),
                    Err(crate::driver::DriverError::NotFound) => None,
                    Err(e) => return Err(GatewayError::Internal(e.to_string())),
                };
                Ok(observed.is_some_and(|t| t.trim() == expected.trim()))
            }
            WaitCondition::CustomScript => {
                let script = self.script.as_deref().unwrap_or_default();
                let value = ctx
                    .page
                    .eval(script)
                    .await
                    .map_err(|e| GatewayError::ExtractionFailed(e.to_string()))?;
                Ok(is_truthy(&value))
            }
        }
    }

    async fn query_info(
        &self,
        ctx: &ExecutionContext,
        selector: &str,
    ) -> Result<Option<crate::driver::ElementInfo>, GatewayError> {
        ctx.page
            .query(selector)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[async_trait]
impl ExecutableCommand for Wait {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        let started = Instant::now();
        let budget = ctx.deadline.saturating_sub(DEADLINE_SLACK);
        let poll = Duration::from_millis(self.poll_interval_ms);

        let mut met = self.condition_holds(ctx).await?;
        while !met && started.elapsed() + poll < budget {
            tokio::time::sleep(poll).await;
            met = self.condition_holds(ctx).await?;
        }

        Ok(ResultPayload::Wait(WaitResult {
            condition: self.condition,
            condition_met: met,
            waited_ms: started.elapsed().as_millis() as u64,
        }))
    }
}
