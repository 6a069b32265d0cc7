// src/core/handler/pipeline/screen.rs

//! Applies the input sanitizer to the string fields of a request before the
//! frame reaches schema validation. URL fields are replaced with their
//! normalized form in place.

use crate::core::errors::GatewayError;
use crate::core::sanitize::Sanitizer;
use serde_json::{Map, Value};

/// Fields screened as free text on every method.
const TEXT_FIELDS: &[&str] = &["selector", "text", "expected_text"];

/// Fields screened and normalized as URLs.
const URL_FIELDS: &[&str] = &["url", "referer"];

/// Screens known string fields of the raw parameter map. The `script` field
/// of wait commands is exempt: it is a script by declaration, and screening
/// it would reject every legitimate use.
pub fn screen_params(
    sanitizer: &Sanitizer,
    params: &mut Map<String, Value>,
) -> Result<(), GatewayError> {
    for key in TEXT_FIELDS {
        if let Some(Value::String(value)) = params.get(*key) {
            sanitizer
                .screen(value)
                .map_err(|r| GatewayError::UnsafeInput(r.category))?;
        }
    }
    for key in URL_FIELDS {
        if let Some(Value::String(value)) = params.get(*key) {
            let normalized = sanitizer
                .normalize_url(value)
                .map_err(|r| GatewayError::UnsafeInput(r.category))?;
            params.insert((*key).to_string(), Value::String(normalized));
        }
    }
    Ok(())
}
