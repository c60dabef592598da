use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::Provider;
use super::configs::OpenAiProviderConfig;
use super::utils::{
    convert_schema, normalize_messages, null_as_default, read_json, ConversationEntry,
    JsonSchemaDialect, ParametersSchema,
};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::{Message, MessageView};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall, ToolContent};

/// A chat message in the Chat Completions shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAiChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<OpenAiToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as the API transports them
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAiToolFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiToolFunction {
    name: String,
    description: String,
    parameters: ParametersSchema<JsonSchemaDialect>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: OpenAiChatMessage,
}

/// An OpenAI reply, or a tool response addressed to OpenAI
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiMessage {
    pub message: OpenAiChatMessage,
    pub tool_call_id: Option<String>,
}

impl MessageView for OpenAiMessage {
    fn role(&self) -> Role {
        Role::from_str(&self.message.role).unwrap_or(Role::Assistant)
    }

    fn content(&self) -> String {
        self.message.content.clone().unwrap_or_default()
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.message
            .tool_calls
            .iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::Object(Map::new()));
                ToolCall::new(call.function.name.clone(), arguments).with_id(call.id.clone())
            })
            .collect()
    }

    fn is_tool_response(&self) -> bool {
        self.message.role == Role::Tool.as_ref() || self.tool_call_id.is_some()
    }

    fn tool_call_id(&self) -> Option<String> {
        self.tool_call_id
            .clone()
            .or_else(|| self.message.tool_call_id.clone())
    }
}

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn entry_to_openai_spec(entry: ConversationEntry) -> OpenAiChatMessage {
        let tool_calls: Vec<OpenAiToolCall> = entry
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| OpenAiToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{}", index)),
                call_type: function_type(),
                function: OpenAiFunctionCall {
                    name: call.name,
                    arguments: call.arguments.to_string(),
                },
            })
            .collect();

        // an assistant turn that only calls tools carries no content
        let content = if entry.content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(entry.content)
        };

        OpenAiChatMessage {
            role: entry.role.to_string(),
            content,
            tool_calls,
            tool_call_id: entry.tool_call_id,
        }
    }

    fn messages_to_openai_spec(&self, prompt: &str, messages: &[Message]) -> Vec<OpenAiChatMessage> {
        normalize_messages(&self.config.system_prompt, messages, prompt)
            .into_iter()
            .map(Self::entry_to_openai_spec)
            .collect()
    }

    fn tools_to_openai_spec(tools: &[Tool]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|tool| OpenAiTool {
                tool_type: "function",
                function: OpenAiToolFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: convert_schema(&tool.input_schema),
                },
            })
            .collect()
    }

    async fn post(&self, payload: &ChatCompletionRequest<'_>) -> ProviderResult<ChatCompletionResponse> {
        let url = format!(
            "{}/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;

        read_json(response).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<Message> {
        let payload = ChatCompletionRequest {
            model: &self.config.model,
            messages: self.messages_to_openai_spec(prompt, messages),
            tools: Self::tools_to_openai_spec(tools),
            stream: false,
        };
        tracing::debug!(
            model = %self.config.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending openai chat completion request"
        );

        let response = self.post(&payload).await?;
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("openai returned no choices".to_string())
        })?;

        Ok(Message::OpenAi(OpenAiMessage {
            message: choice.message,
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
        Ok(Message::OpenAi(OpenAiMessage {
            message: OpenAiChatMessage {
                role: Role::Tool.to_string(),
                content: Some(content.into_text()?),
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_call_id.to_string()),
            },
            tool_call_id: Some(tool_call_id.to_string()),
        }))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
