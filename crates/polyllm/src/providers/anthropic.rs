use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::Provider;
use super::configs::AnthropicProviderConfig;
use super::utils::{
    convert_schema, normalize_messages, null_as_default, read_json, ConversationEntry,
    JsonSchemaDialect, ParametersSchema,
};
use crate::errors::ProviderResult;
use crate::models::message::{Message, MessageView};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall, ToolContent};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this crate does not interpret (thinking, citations, ...)
    #[serde(other)]
    Unsupported,
}

/// A message in the Messages API shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicChatMessage {
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: ParametersSchema<JsonSchemaDialect>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    stream: bool,
}

/// An Anthropic reply, or a tool response addressed to Anthropic
#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicMessage {
    pub message: AnthropicChatMessage,
    pub tool_call_id: Option<String>,
}

impl MessageView for AnthropicMessage {
    fn role(&self) -> Role {
        Role::from_str(&self.message.role).unwrap_or(Role::Assistant)
    }

    fn content(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::ToolResult { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.message
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::new(name.clone(), input.clone()).with_id(id.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn is_tool_response(&self) -> bool {
        self.tool_call_id.is_some()
            || self
                .message
                .content
                .iter()
                .any(|block| matches!(block, AnthropicContentBlock::ToolResult { .. }))
    }

    fn tool_call_id(&self) -> Option<String> {
        self.tool_call_id.clone().or_else(|| {
            self.message.content.iter().find_map(|block| match block {
                AnthropicContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.clone()),
                _ => None,
            })
        })
    }
}

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    /// Split the normalized entries into the top-level system prompt and the
    /// message list. Tool results travel as user messages.
    fn messages_to_anthropic_spec(
        &self,
        prompt: &str,
        messages: &[Message],
    ) -> (Option<String>, Vec<AnthropicChatMessage>) {
        let mut system = Vec::new();
        let mut anthropic_messages = Vec::new();

        for entry in normalize_messages(&self.config.system_prompt, messages, prompt) {
            match entry.role {
                Role::System => system.push(entry.content),
                Role::Tool => anthropic_messages.push(AnthropicChatMessage {
                    role: Role::User.to_string(),
                    content: vec![AnthropicContentBlock::ToolResult {
                        tool_use_id: entry.tool_call_id.unwrap_or_default(),
                        content: entry.content,
                    }],
                }),
                Role::User | Role::Assistant => {
                    anthropic_messages.push(Self::entry_to_anthropic_spec(entry))
                }
            }
        }

        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        (system, anthropic_messages)
    }

    fn entry_to_anthropic_spec(entry: ConversationEntry) -> AnthropicChatMessage {
        let mut content = Vec::with_capacity(entry.tool_calls.len() + 1);
        if !entry.content.is_empty() {
            content.push(AnthropicContentBlock::Text {
                text: entry.content,
            });
        }
        for (index, call) in entry.tool_calls.into_iter().enumerate() {
            content.push(AnthropicContentBlock::ToolUse {
                id: call.id.unwrap_or_else(|| format!("toolu_{}", index)),
                name: call.name,
                // tool_use input must be an object
                input: match call.arguments {
                    input @ Value::Object(_) => input,
                    _ => Value::Object(Map::new()),
                },
            });
        }

        AnthropicChatMessage {
            role: entry.role.to_string(),
            content,
        }
    }

    fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: convert_schema(&tool.input_schema),
            })
            .collect()
    }

    async fn post(&self, payload: &MessagesRequest<'_>) -> ProviderResult<AnthropicChatMessage> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
            .send()
            .await?;

        read_json(response).await
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<Message> {
        let (system, anthropic_messages) = self.messages_to_anthropic_spec(prompt, messages);
        let payload = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: anthropic_messages,
            tools: Self::tools_to_anthropic_spec(tools),
            stream: false,
        };
        tracing::debug!(
            model = %self.config.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending anthropic messages request"
        );

        let reply = self.post(&payload).await?;
        Ok(Message::Anthropic(AnthropicMessage {
            message: reply,
            tool_call_id: None,
        }))
    }

    async fn supports_tools(&self) -> bool {
        true
    }

    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> ProviderResult<Message> {
        Ok(Message::Anthropic(AnthropicMessage {
            message: AnthropicChatMessage {
                role: Role::Tool.to_string(),
                content: vec![AnthropicContentBlock::ToolResult {
                    tool_use_id: tool_call_id.to_string(),
                    content: content.into_text()?,
                }],
            },
            tool_call_id: Some(tool_call_id.to_string()),
        }))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
