use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::base::Provider;
use super::configs::OllamaProviderConfig;
use super::utils::{
    convert_schema, normalize_messages, null_as_default, read_json, OllamaDialect,
    ParametersSchema,
};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::{Message, MessageView};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall, ToolContent};

pub const OLLAMA_HOST: &str = "http://127.0.0.1:11434";
pub const OLLAMA_CAPABILITY_TOOLS: &str = "tools";

/// A chat message as Ollama's `/api/chat` sends and receives it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OllamaToolFunction,
}

#[derive(Debug, Serialize)]
struct OllamaToolFunction {
    name: String,
    description: String,
    parameters: ParametersSchema<OllamaDialect>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: OllamaChatMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    #[serde(default)]
    capabilities: Vec<String>,
}

/// An Ollama reply, or a tool response addressed to Ollama
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaMessage {
    pub message: OllamaChatMessage,
    pub tool_call_id: Option<String>,
}

impl MessageView for OllamaMessage {
    fn role(&self) -> Role {
        Role::from_str(&self.message.role).unwrap_or(Role::Assistant)
    }

    fn content(&self) -> String {
        self.message.content.clone()
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.message
            .tool_calls
            .iter()
            .map(|call| ToolCall::new(call.function.name.clone(), call.function.arguments.clone()))
            .collect()
    }

    fn is_tool_response(&self) -> bool {
        self.message.role == Role::Tool.as_ref() || self.tool_call_id.is_some()
    }

    fn tool_call_id(&self) -> Option<String> {
        self.tool_call_id.clone()
    }
}

pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    fn messages_to_ollama_spec(&self, prompt: &str, messages: &[Message]) -> Vec<OllamaChatMessage> {
        normalize_messages(&self.config.system_prompt, messages, prompt)
            .into_iter()
            .map(|entry| OllamaChatMessage {
                role: entry.role.to_string(),
                content: entry.content,
                tool_calls: entry
                    .tool_calls
                    .into_iter()
                    .map(|call| OllamaToolCall {
                        function: OllamaToolCallFunction {
                            name: call.name,
                            arguments: call.arguments,
                        },
                    })
                    .collect(),
            })
            .collect()
    }

    fn tools_to_ollama_spec(tools: &[Tool]) -> Vec<OllamaTool> {
        tools
            .iter()
            .map(|tool| OllamaTool {
                tool_type: "function",
                function: OllamaToolFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: convert_schema(&tool.input_schema),
                },
            })
            .collect()
    }

    /// Keep only the message of the response marked `done`. With streaming
    /// disabled that is the single object in the body, possibly pretty-printed,
    /// but a newline-delimited stream is accepted too.
    fn final_message(body: &str) -> ProviderResult<OllamaChatMessage> {
        let incomplete =
            || ProviderError::InvalidResponse("ollama chat returned no completed response".to_string());

        if let Ok(response) = serde_json::from_str::<ChatResponse>(body) {
            return response.done.then_some(response.message).ok_or_else(incomplete);
        }

        let mut completed = None;
        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            let chunk: ChatResponse = serde_json::from_str(line)
                .map_err(|e| ProviderError::InvalidResponse(format!("ollama chat: {}", e)))?;
            if chunk.done {
                completed = Some(chunk.message);
            }
        }
        completed.ok_or_else(incomplete)
    }

    async fn show(&self) -> ProviderResult<ShowResponse> {
        let response = self
            .client
            .post(self.url("/api/show"))
            .json(&json!({ "model": self.config.model }))
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<Message> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: self.messages_to_ollama_spec(prompt, messages),
            tools: Self::tools_to_ollama_spec(tools),
            stream: false,
        };
        tracing::debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending ollama chat request"
        );

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api { status, body });
        }

        Ok(Message::Ollama(OllamaMessage {
            message: Self::final_message(&body)?,
            tool_call_id: None,
        }))
    }

    async fn supports_tools(&self) -> bool {
        match self.show().await {
            Ok(show) => show
                .capabilities
                .iter()
                .any(|capability| capability == OLLAMA_CAPABILITY_TOOLS),
            Err(e) => {
                tracing::warn!(model = %self.config.model, error = %e, "ollama show request failed");
                false
            }
        }
    }

    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> ProviderResult<Message> {
        Ok(Message::Ollama(OllamaMessage {
            message: OllamaChatMessage {
                role: Role::Tool.to_string(),
                content: content.into_text()?,
                tool_calls: Vec::new(),
            },
            tool_call_id: Some(tool_call_id.to_string()),
        }))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
