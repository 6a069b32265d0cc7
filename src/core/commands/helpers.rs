// src/core/commands/helpers.rs

//! Small helpers for pulling typed fields out of request-frame JSON.

use crate::core::errors::GatewayError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub fn req_str(params: &Map<String, Value>, key: &'static str) -> Result<String, GatewayError> {
    match params.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(GatewayError::InvalidCommand(format!(
            "field '{key}' must not be empty"
        ))),
        Some(_) => Err(GatewayError::InvalidCommand(format!(
            "field '{key}' must be a string"
        ))),
        None => Err(GatewayError::MissingField(key)),
    }
}

pub fn opt_str(
    params: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, GatewayError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(GatewayError::InvalidCommand(format!(
            "field '{key}' must be a string"
        ))),
    }
}

pub fn opt_bool(
    params: &Map<String, Value>,
    key: &'static str,
    default: bool,
) -> Result<bool, GatewayError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(GatewayError::InvalidCommand(format!(
            "field '{key}' must be a boolean"
        ))),
    }
}

pub fn opt_u64(
    params: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<u64>, GatewayError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            GatewayError::InvalidCommand(format!("field '{key}' must be a non-negative integer"))
        }).map(Some),
        Some(_) => Err(GatewayError::InvalidCommand(format!(
            "field '{key}' must be an integer"
        ))),
    }
}

pub fn opt_f64(
    params: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<f64>, GatewayError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(GatewayError::InvalidCommand(format!(
            "field '{key}' must be a number"
        ))),
    }
}

/// Deserializes an enum-valued field (e.g. `wait_until`, `button`).
pub fn opt_enum<T: DeserializeOwned>(
    params: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<T>, GatewayError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|_| {
            GatewayError::InvalidCommand(format!("field '{key}' has an unsupported value"))
        }),
    }
}

pub fn req_enum<T: DeserializeOwned>(
    params: &Map<String, Value>,
    key: &'static str,
) -> Result<T, GatewayError> {
    opt_enum(params, key)?.ok_or(GatewayError::MissingField(key))
}
