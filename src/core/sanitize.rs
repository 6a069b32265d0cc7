// src/core/sanitize.rs

//! Screens client-supplied strings for script-injection patterns and
//! normalizes URL fields before commands reach schema validation.
//!
//! Rejections carry only a pattern *category*; the offending substring is
//! never echoed back to the client.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

/// Upper bound on any screened string. Longer values are rejected outright
/// so a hostile client cannot feed multi-megabyte selectors into the regex
/// engine.
const MAX_FIELD_LEN: usize = 4096;

/// The category of pattern that caused a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionCategory {
    InlineEventHandler,
    ScriptTag,
    JavascriptScheme,
    DataHtmlPayload,
    CssExpression,
    DisallowedScheme,
    MalformedUrl,
    Oversized,
}

impl std::fmt::Display for RejectionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RejectionCategory::InlineEventHandler => "inline-event-handler",
            RejectionCategory::ScriptTag => "script-tag",
            RejectionCategory::JavascriptScheme => "javascript-scheme",
            RejectionCategory::DataHtmlPayload => "data-html-payload",
            RejectionCategory::CssExpression => "css-expression",
            RejectionCategory::DisallowedScheme => "disallowed-scheme",
            RejectionCategory::MalformedUrl => "malformed-url",
            RejectionCategory::Oversized => "oversized",
        };
        f.write_str(name)
    }
}

/// A typed sanitizer rejection. Deliberately does not hold the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub category: RejectionCategory,
}

impl Rejection {
    fn new(category: RejectionCategory) -> Self {
        Self { category }
    }
}

static INJECTION_PATTERNS: Lazy<Vec<(Regex, RejectionCategory)>> = Lazy::new(|| {
    vec![
        (
            // onclick=, onmouseover = , etc., as they would appear inside an
            // attribute-injection attempt.
            Regex::new(r"(?i)\bon[a-z]{2,}\s*=").unwrap(),
            RejectionCategory::InlineEventHandler,
        ),
        (
            Regex::new(r"(?i)<\s*script").unwrap(),
            RejectionCategory::ScriptTag,
        ),
        (
            Regex::new(r"(?i)javascript\s*:").unwrap(),
            RejectionCategory::JavascriptScheme,
        ),
        (
            Regex::new(r"(?i)data\s*:\s*text/html").unwrap(),
            RejectionCategory::DataHtmlPayload,
        ),
        (
            Regex::new(r"(?i)\bexpression\s*\(").unwrap(),
            RejectionCategory::CssExpression,
        ),
    ]
});

/// Screens selectors, URLs and free text, and normalizes URLs.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    allow_non_http_urls: bool,
}

impl Sanitizer {
    pub fn new(allow_non_http_urls: bool) -> Self {
        Self {
            allow_non_http_urls,
        }
    }

    /// Screens a free-form string (selector, text, expected text) against the
    /// injection pattern set. Returns the input untouched when it is clean.
    pub fn screen<'a>(&self, value: &'a str) -> Result<&'a str, Rejection> {
        if value.len() > MAX_FIELD_LEN {
            return Err(Rejection::new(RejectionCategory::Oversized));
        }
        for (pattern, category) in INJECTION_PATTERNS.iter() {
            if pattern.is_match(value) {
                return Err(Rejection::new(*category));
            }
        }
        Ok(value)
    }

    /// Screens and normalizes a URL field. Only `http` and `https` are
    /// accepted unless the deployment explicitly enables other schemes.
    pub fn normalize_url(&self, raw: &str) -> Result<String, Rejection> {
        self.screen(raw)?;
        let parsed =
            Url::parse(raw.trim()).map_err(|_| Rejection::new(RejectionCategory::MalformedUrl))?;
        match parsed.scheme() {
            "http" | "https" => {}
            // `javascript:` is always an injection, never a scheme choice.
            "javascript" => return Err(Rejection::new(RejectionCategory::JavascriptScheme)),
            _ if self.allow_non_http_urls => {}
            _ => return Err(Rejection::new(RejectionCategory::DisallowedScheme)),
        }
        Ok(parsed.to_string())
    }
}
