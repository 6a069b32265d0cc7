// src/core/commands/extract.rs

use crate::core::commands::ResultPayload;
use crate::core::commands::command_trait::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::commands::helpers::{opt_bool, opt_str, req_enum, req_str};
use crate::core::errors::GatewayError;
use crate::driver::{DriverError, ReadTarget};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What an extract command pulls off matched elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractKind {
    Text,
    Html,
    Attribute,
    Property,
}

/// The `extract` command. Read-only and cache-eligible.
#[derive(Debug, Clone)]
pub struct Extract {
    pub selector: String,
    pub kind: ExtractKind,
    pub attribute_name: Option<String>,
    pub property_name: Option<String>,
    pub multiple: bool,
    pub trim: bool,
}

impl ParseCommand for Extract {
    fn parse(params: &Map<String, Value>) -> Result<Self, GatewayError> {
        let kind: ExtractKind = req_enum(params, "kind")?;
        let attribute_name = opt_str(params, "attribute_name")?;
        let property_name = opt_str(params, "property_name")?;
        if kind == ExtractKind::Attribute && attribute_name.is_none() {
            return Err(GatewayError::MissingField("attribute_name"));
        }
        if kind == ExtractKind::Property && property_name.is_none() {
            return Err(GatewayError::MissingField("property_name"));
        }
        Ok(Extract {
            selector: req_str(params, "selector")?,
            kind,
            attribute_name,
            property_name,
            multiple: opt_bool(params, "multiple", false)?,
            trim: opt_bool(params, "trim", true)?,
        })
    }
}

impl Extract {
    /// The driver-facing read target for this command.
    pub fn read_target(&self) -> ReadTarget {
        match self.kind {
            ExtractKind::Text => ReadTarget::Text,
            ExtractKind::Html => ReadTarget::Html,
            // Presence of the names is enforced at parse time.
            ExtractKind::Attribute => {
                ReadTarget::Attribute(self.attribute_name.clone().unwrap_or_default())
            }
            ExtractKind::Property => {
                ReadTarget::Property(self.property_name.clone().unwrap_or_default())
            }
        }
    }

    /// The kind-specific parameter that affects output, as it participates in
    /// the cache fingerprint.
    pub fn kind_parameter(&self) -> &str {
        match self.kind {
            ExtractKind::Attribute => self.attribute_name.as_deref().unwrap_or(""),
            ExtractKind::Property => self.property_name.as_deref().unwrap_or(""),
            _ => "",
        }
    }
}

/// Per-match element metadata returned alongside the extracted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedElement {
    pub tag: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractResult {
    /// A single value, or an array in DOM order when `multiple` was set.
    pub data: Value,
    pub elements: Vec<MatchedElement>,
    /// Set when the payload was served from the result cache.
    pub from_cache: bool,
}

#[async_trait]
impl ExecutableCommand for Extract {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        let nodes = ctx
            .page
            .read(&self.selector, &self.read_target(), self.multiple)
            .await
            .map_err(|e| match e {
                DriverError::NotFound => GatewayError::ElementNotFound,
                other => GatewayError::ExtractionFailed(other.to_string()),
            })?;

        let mut values = Vec::with_capacity(nodes.len());
        let mut elements = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.into_iter().enumerate() {
            let value = match node.value {
                Value::String(s) if self.kind == ExtractKind::Text && self.trim => {
                    Value::String(s.trim().to_string())
                }
                other => other,
            };
            values.push(value);
            elements.push(MatchedElement {
                tag: node.tag,
                index,
            });
        }

        let data = if self.multiple {
            Value::Array(values)
        } else {
            values.into_iter().next().unwrap_or(Value::Null)
        };

        Ok(ResultPayload::Extract(ExtractResult {
            data,
            elements,
            from_cache: false,
        }))
    }
}
