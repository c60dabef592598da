use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ProviderError, ProviderResult};

/// A tool that can be offered to a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON-schema-like description of the arguments
    pub input_schema: ToolInputSchema,
}

impl Tool {
    pub fn new<N, D>(name: N, description: D, input_schema: ToolInputSchema) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// The input schema as the caller supplied it.
///
/// Properties are kept as raw JSON; anything beyond the type tag, the required
/// list and the properties (`$defs`, `items`, ...) is retained in `extra` so
/// that nothing is rejected on input. What survives on the way out depends on
/// the schema conversion in `providers::utils`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: default_schema_type(),
            required: Vec::new(),
            properties: Map::new(),
            extra: Map::new(),
        }
    }
}

impl TryFrom<Value> for ToolInputSchema {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

/// A tool call requested by an assistant turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Backend call identifier, when the backend issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution, not validated against any schema
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// The result of running a tool, before it is addressed back to a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    Text(String),
    Structured(Value),
}

impl ToolContent {
    /// Capture any serializable value. Strings stay text, everything else is
    /// kept as structured JSON.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> ProviderResult<Self> {
        let value = serde_json::to_value(value).map_err(ProviderError::Marshal)?;
        Ok(value.into())
    }

    /// The text sent to the backend: strings verbatim, everything else as compact JSON
    pub fn into_text(self) -> ProviderResult<String> {
        match self {
            ToolContent::Text(text) => Ok(text),
            ToolContent::Structured(value) => {
                serde_json::to_string(&value).map_err(ProviderError::Marshal)
            }
        }
    }
}

impl From<String> for ToolContent {
    fn from(text: String) -> Self {
        ToolContent::Text(text)
    }
}

impl From<&str> for ToolContent {
    fn from(text: &str) -> Self {
        ToolContent::Text(text.to_string())
    }
}

impl From<Value> for ToolContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ToolContent::Text(text),
            other => ToolContent::Structured(other),
        }
    }
}
