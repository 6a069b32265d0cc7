// src/core/errors.rs

//! Defines the primary error type for the entire application.

use crate::core::sanitize::RejectionCategory;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the gateway.
/// Every reply frame with `success = false` is derived from one of these
/// variants; `error_code` and `error_type` give clients a stable, machine
/// readable taxonomy while the `Display` impl carries the human message.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("authentication failed")]
    AuthFailed,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("input rejected: {0}")]
    UnsafeInput(RejectionCategory),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("session '{0}' is owned by another client")]
    SessionNotOwned(String),

    #[error("browser capacity exhausted")]
    ResourceExhausted,

    #[error("no element matches the selector")]
    ElementNotFound,

    #[error("element is not visible")]
    ElementNotVisible,

    #[error("element is not interactable")]
    ElementNotInteractable,

    #[error("command deadline expired after {0} ms")]
    Timeout(u64),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The stable wire-level error code surfaced in reply frames.
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::InvalidCommand(_)
            | GatewayError::UnknownMethod(_)
            | GatewayError::MissingField(_) => "INVALID_COMMAND",
            GatewayError::AuthFailed => "AUTH_FAILED",
            GatewayError::RateLimited => "RATE_LIMITED",
            GatewayError::UnsafeInput(_) => "UNSAFE_INPUT",
            GatewayError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            GatewayError::SessionNotOwned(_) => "SESSION_NOT_OWNED",
            GatewayError::ResourceExhausted => "RESOURCE_EXHAUSTED",
            GatewayError::ElementNotFound => "ELEMENT_NOT_FOUND",
            GatewayError::ElementNotVisible => "ELEMENT_NOT_VISIBLE",
            GatewayError::ElementNotInteractable => "ELEMENT_NOT_INTERACTABLE",
            GatewayError::Timeout(_) => "TIMEOUT",
            GatewayError::NavigationFailed(_) => "NAVIGATION_FAILED",
            GatewayError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            GatewayError::ShuttingDown => "SHUTTING_DOWN",
            GatewayError::Internal(_) => "INTERNAL",
        }
    }

    /// A coarse grouping of the error code, also surfaced on the wire.
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::InvalidCommand(_)
            | GatewayError::UnknownMethod(_)
            | GatewayError::MissingField(_)
            | GatewayError::UnsafeInput(_) => "validation",
            GatewayError::AuthFailed => "auth",
            GatewayError::RateLimited | GatewayError::ResourceExhausted => "limit",
            GatewayError::SessionNotFound(_) | GatewayError::SessionNotOwned(_) => "session",
            GatewayError::ElementNotFound
            | GatewayError::ElementNotVisible
            | GatewayError::ElementNotInteractable
            | GatewayError::Timeout(_)
            | GatewayError::NavigationFailed(_)
            | GatewayError::ExtractionFailed(_) => "execution",
            GatewayError::Io(_) | GatewayError::ShuttingDown | GatewayError::Internal(_) => {
                "internal"
            }
        }
    }

    /// The human-facing message for the wire. Internal failures are logged in
    /// full by the caller and surfaced here without their detail so that
    /// backend strings and backtraces never reach a client.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Io(_) | GatewayError::Internal(_) => {
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for GatewayError {
    fn clone(&self) -> Self {
        match self {
            GatewayError::Io(e) => GatewayError::Io(Arc::clone(e)),
            GatewayError::InvalidCommand(s) => GatewayError::InvalidCommand(s.clone()),
            GatewayError::UnknownMethod(s) => GatewayError::UnknownMethod(s.clone()),
            GatewayError::MissingField(f) => GatewayError::MissingField(f),
            GatewayError::AuthFailed => GatewayError::AuthFailed,
            GatewayError::RateLimited => GatewayError::RateLimited,
            GatewayError::UnsafeInput(c) => GatewayError::UnsafeInput(*c),
            GatewayError::SessionNotFound(s) => GatewayError::SessionNotFound(s.clone()),
            GatewayError::SessionNotOwned(s) => GatewayError::SessionNotOwned(s.clone()),
            GatewayError::ResourceExhausted => GatewayError::ResourceExhausted,
            GatewayError::ElementNotFound => GatewayError::ElementNotFound,
            GatewayError::ElementNotVisible => GatewayError::ElementNotVisible,
            GatewayError::ElementNotInteractable => GatewayError::ElementNotInteractable,
            GatewayError::Timeout(ms) => GatewayError::Timeout(*ms),
            GatewayError::NavigationFailed(s) => GatewayError::NavigationFailed(s.clone()),
            GatewayError::ExtractionFailed(s) => GatewayError::ExtractionFailed(s.clone()),
            GatewayError::ShuttingDown => GatewayError::ShuttingDown,
            GatewayError::Internal(s) => GatewayError::Internal(s.clone()),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Internal(format!("JSON serialization error: {e}"))
    }
}
