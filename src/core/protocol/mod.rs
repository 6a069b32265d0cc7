// src/core/protocol/mod.rs

//! Wire frames: one self-describing UTF-8 JSON object per WebSocket message.
//!
//! A request carries `id`, `method`, an optional `session_id` and
//! method-specific fields. A reply echoes the `id` and carries either the
//! method-specific success fields or the error block; no other reply shape
//! exists.

use crate::core::commands::ResultPayload;
use crate::core::errors::GatewayError;
use crate::core::state_diff::StateDiff;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded request frame.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Shared secret; only meaningful on the first frame of a connection.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Optional stable client identity; generated per connection otherwise.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Everything else: the method-specific fields.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl RequestFrame {
    /// Decodes one frame. Shape failures are client errors, not connection
    /// errors.
    pub fn decode(text: &str) -> Result<Self, GatewayError> {
        let frame: RequestFrame = serde_json::from_str(text)
            .map_err(|e| GatewayError::InvalidCommand(format!("malformed frame: {e}")))?;
        if frame.id.is_empty() {
            return Err(GatewayError::InvalidCommand(
                "frame is missing a non-empty 'id'".to_string(),
            ));
        }
        if frame.method.is_empty() {
            return Err(GatewayError::InvalidCommand(
                "frame is missing a non-empty 'method'".to_string(),
            ));
        }
        Ok(frame)
    }

    /// A normalized view of the target session: empty string means absent.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }
}

/// A reply frame ready for encoding.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyFrame {
    pub id: String,
    pub success: bool,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub execution_time_ms: u64,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ReplyFrame {
    pub fn ok(
        id: &str,
        execution_time_ms: u64,
        payload: &ResultPayload,
        diff: Option<&StateDiff>,
    ) -> Self {
        let mut body = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            // Payloads are structs; anything else is a programming error and
            // is surfaced as an internal failure instead of a bad frame.
            _ => {
                return Self::failure(
                    id,
                    execution_time_ms,
                    &GatewayError::Internal("unencodable result payload".to_string()),
                );
            }
        };
        if let Some(diff) = diff {
            if let Ok(value) = serde_json::to_value(diff) {
                body.insert("state_diff".to_string(), value);
            }
        }
        Self {
            id: id.to_string(),
            success: true,
            timestamp: chrono::Utc::now().timestamp(),
            execution_time_ms,
            body,
        }
    }

    pub fn failure(id: &str, execution_time_ms: u64, error: &GatewayError) -> Self {
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(error.client_message()));
        body.insert(
            "error_code".to_string(),
            Value::String(error.error_code().to_string()),
        );
        body.insert(
            "error_type".to_string(),
            Value::String(error.error_type().to_string()),
        );
        body.insert("details".to_string(), error_details(error));
        Self {
            id: id.to_string(),
            success: false,
            timestamp: chrono::Utc::now().timestamp(),
            execution_time_ms,
            body,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // A reply that cannot be encoded still has to honor the
            // one-reply-per-request contract.
            format!(
                "{{\"id\":{},\"success\":false,\"error_code\":\"INTERNAL\"}}",
                serde_json::Value::String(self.id.clone())
            )
        })
    }
}

/// Structured, non-sensitive context for the error block.
fn error_details(error: &GatewayError) -> Value {
    let mut details = Map::new();
    match error {
        GatewayError::UnsafeInput(category) => {
            details.insert(
                "category".to_string(),
                Value::String(category.to_string()),
            );
        }
        GatewayError::Timeout(ms) => {
            details.insert("timeout_ms".to_string(), Value::from(*ms));
        }
        GatewayError::SessionNotFound(id) | GatewayError::SessionNotOwned(id) => {
            details.insert("session_id".to_string(), Value::String(id.clone()));
        }
        GatewayError::UnknownMethod(method) => {
            details.insert("method".to_string(), Value::String(method.clone()));
        }
        _ => {}
    }
    Value::Object(details)
}
