use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{ToolCall, ToolInputSchema};

/// One outgoing turn after normalization, before any backend formatting
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// Set on `tool` entries when the answered call is known
    pub tool_call_id: Option<String>,
}

impl ConversationEntry {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Flatten the system prompt, the history and the new prompt into the ordered
/// entries every backend sends.
///
/// Tool responses with no extractable content are dropped, as are messages
/// with neither text nor tool calls. Only assistant entries carry tool calls,
/// and calls without a name are left out.
pub fn normalize_messages(system: &str, messages: &[Message], prompt: &str) -> Vec<ConversationEntry> {
    let mut entries = Vec::with_capacity(messages.len() + 2);

    if !system.is_empty() {
        entries.push(ConversationEntry::new(Role::System, system.to_string()));
    }

    for message in messages {
        if message.is_tool_response() {
            let content = message.tool_response_content();
            if content.is_empty() {
                continue;
            }
            let mut entry = ConversationEntry::new(Role::Tool, content);
            entry.tool_call_id = message.tool_call_id();
            entries.push(entry);
            continue;
        }

        let content = message.content();
        let tool_calls = message.tool_calls();
        if content.is_empty() && tool_calls.is_empty() {
            continue;
        }

        let role = message.role();
        let mut entry = ConversationEntry::new(role, content);
        if role == Role::Assistant {
            entry.tool_calls = tool_calls
                .into_iter()
                .filter(|call| !call.name.is_empty())
                .collect();
        }
        entries.push(entry);
    }

    if !prompt.is_empty() {
        entries.push(ConversationEntry::new(Role::User, prompt.to_string()));
    }

    entries
}

/// How a backend spells schema types
pub trait SchemaDialect: Debug + Clone + PartialEq {
    type PropertyType: Serialize + Debug + Clone + PartialEq;

    fn property_type(raw: &str) -> Self::PropertyType;

    fn schema_type(raw: &str) -> String {
        raw.to_string()
    }
}

/// Plain JSON schema type names (`"string"`), used by Anthropic and OpenAI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonSchemaDialect;

impl SchemaDialect for JsonSchemaDialect {
    type PropertyType = String;

    fn property_type(raw: &str) -> String {
        raw.to_string()
    }
}

/// Ollama takes property types as a list (`["string"]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OllamaDialect;

impl SchemaDialect for OllamaDialect {
    type PropertyType = Vec<String>;

    fn property_type(raw: &str) -> Vec<String> {
        vec![raw.to_string()]
    }
}

/// Gemini uses the upper-case OpenAPI type enum (`"STRING"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeminiDialect;

impl SchemaDialect for GeminiDialect {
    type PropertyType = String;

    fn property_type(raw: &str) -> String {
        raw.to_uppercase()
    }

    fn schema_type(raw: &str) -> String {
        raw.to_uppercase()
    }
}

/// Normalized tool parameters in one backend's dialect
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct ParametersSchema<D: SchemaDialect> {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub required: Vec<String>,
    pub properties: BTreeMap<String, PropertySchema<D>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct PropertySchema<D: SchemaDialect> {
    #[serde(rename = "type")]
    pub property_type: D::PropertyType,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema<D>>>,
}

const SCALAR_TYPES: [&str; 5] = ["string", "number", "integer", "boolean", "null"];

/// Convert a caller's input schema into the normalized form.
///
/// Properties that are not JSON objects are skipped. Enum members that are not
/// strings are dropped. `$defs`, nested object properties and anything below a
/// scalar array's `items` do not survive.
pub fn convert_schema<D: SchemaDialect>(schema: &ToolInputSchema) -> ParametersSchema<D> {
    let properties = schema
        .properties
        .iter()
        .filter_map(|(name, raw)| {
            convert_property::<D>(raw, true).map(|property| (name.clone(), property))
        })
        .collect();

    ParametersSchema {
        schema_type: D::schema_type(&schema.schema_type),
        required: schema.required.clone(),
        properties,
    }
}

fn convert_property<D: SchemaDialect>(raw: &Value, allow_items: bool) -> Option<PropertySchema<D>> {
    let object = raw.as_object()?;
    let raw_type = get_str(raw, "type");

    let enum_values = object
        .get("enum")
        .and_then(Value::as_array)
        .map(|members| {
            members
                .iter()
                .filter_map(|member| member.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let items = match object.get("items") {
        Some(items)
            if allow_items
                && raw_type == "array"
                && SCALAR_TYPES.contains(&get_str(items, "type")) =>
        {
            convert_property::<D>(items, false).map(Box::new)
        }
        _ => None,
    };

    Some(PropertySchema {
        property_type: D::property_type(raw_type),
        description: get_str(raw, "description").to_string(),
        enum_values,
        items,
    })
}

fn get_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Deserialize `null` as the type's default, for lists some backends send as `null`
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a successful JSON body, or turn the status and body into an error
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json().await?)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::HistoryMessage;
    use serde_json::json;

    fn history(message: HistoryMessage) -> Message {
        message.into()
    }

    #[test]
    fn test_system_history_and_prompt_order() {
        let messages = vec![
            history(HistoryMessage::user().with_text("hi")),
            history(HistoryMessage::assistant().with_text("hello")),
        ];

        let entries = normalize_messages("be brief", &messages, "how are you?");

        let roles: Vec<Role> = entries.iter().map(|e| e.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(entries[0].content, "be brief");
        assert_eq!(entries[3].content, "how are you?");
    }

    #[test]
    fn test_empty_system_and_prompt_are_not_sent() {
        let messages = vec![history(HistoryMessage::user().with_text("hi"))];
        let entries = normalize_messages("", &messages, "");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, Role::User);
    }

    #[test]
    fn test_empty_tool_result_is_dropped() {
        let messages = vec![history(HistoryMessage::tool().with_tool_result("call_1", ""))];
        assert!(normalize_messages("", &messages, "").is_empty());
    }

    #[test]
    fn test_tool_result_becomes_tool_entry() {
        let messages = vec![history(
            HistoryMessage::user().with_tool_result("call_1", "72F and sunny"),
        )];

        let entries = normalize_messages("", &messages, "");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, Role::Tool);
        assert_eq!(entries[0].content, "72F and sunny");
        assert_eq!(entries[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_empty_assistant_message_is_dropped() {
        let messages = vec![history(HistoryMessage::assistant().with_text(""))];
        assert!(normalize_messages("", &messages, "").is_empty());
    }

    #[test]
    fn test_assistant_tool_call_is_carried() {
        let messages = vec![history(
            HistoryMessage::assistant().with_tool_use("id_1", "lookup", json!({"q": "x"})),
        )];

        let entries = normalize_messages("", &messages, "");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, Role::Assistant);
        assert_eq!(entries[0].tool_calls.len(), 1);
        assert_eq!(entries[0].tool_calls[0].name, "lookup");
        assert_eq!(entries[0].tool_calls[0].arguments, json!({"q": "x"}));
    }

    #[test]
    fn test_unnamed_and_non_assistant_tool_calls_are_dropped() {
        let messages = vec![
            history(
                HistoryMessage::assistant()
                    .with_text("calling")
                    .with_tool_use("id_1", "", json!({})),
            ),
            history(HistoryMessage::user().with_tool_use("id_2", "lookup", json!({}))),
        ];

        let entries = normalize_messages("", &messages, "");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].tool_calls.is_empty());
        assert_eq!(entries[1].role, Role::User);
        assert!(entries[1].tool_calls.is_empty());
    }

    fn weather_schema() -> ToolInputSchema {
        ToolInputSchema::try_from(json!({
            "type": "object",
            "required": ["location"],
            "properties": {
                "location": {"type": "string", "description": "City name"},
                "unit": {"type": "string", "description": "Unit", "enum": ["c", "f", 3, null]},
                "days": {"type": "array", "description": "Days", "items": {"type": "integer"}},
                "filters": {"type": "array", "items": {"type": "object", "properties": {}}},
                "nested": {"type": "object", "properties": {"a": {"type": "string"}}},
                "broken": "not an object"
            },
            "$defs": {"Unused": {"type": "object"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_convert_schema_json_dialect() {
        let schema = convert_schema::<JsonSchemaDialect>(&weather_schema());

        assert_eq!(schema.schema_type, "object");
        assert_eq!(schema.required, vec!["location"]);
        assert!(!schema.properties.contains_key("broken"));

        let unit = &schema.properties["unit"];
        assert_eq!(unit.property_type, "string");
        assert_eq!(unit.enum_values, vec!["c", "f"]);

        let days = &schema.properties["days"];
        assert_eq!(days.items.as_ref().unwrap().property_type, "integer");
        assert!(schema.properties["filters"].items.is_none());

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value["properties"]["nested"],
            json!({"type": "object", "description": ""})
        );
        assert!(value.get("$defs").is_none());
    }

    #[test]
    fn test_convert_schema_ollama_and_gemini_dialects() {
        let ollama = serde_json::to_value(convert_schema::<OllamaDialect>(&weather_schema())).unwrap();
        assert_eq!(ollama["type"], "object");
        assert_eq!(ollama["properties"]["location"]["type"], json!(["string"]));

        let gemini = serde_json::to_value(convert_schema::<GeminiDialect>(&weather_schema())).unwrap();
        assert_eq!(gemini["type"], "OBJECT");
        assert_eq!(gemini["properties"]["days"]["items"]["type"], "INTEGER");
    }
}
