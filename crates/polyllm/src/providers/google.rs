use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::base::Provider;
use super::configs::GoogleProviderConfig;
use super::utils::{
    convert_schema, normalize_messages, null_as_default, read_json, ConversationEntry,
    GeminiDialect, ParametersSchema,
};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::{Message, MessageView};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall, ToolContent};

const GEMINI_MODEL_ROLE: &str = "model";
const GEMINI_USER_ROLE: &str = "user";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parts: Vec<GeminiPart>,
}

/// One part of a Gemini content; exactly one field is set in practice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

impl GeminiFunctionResponse {
    fn new(name: String, content: String) -> Self {
        Self {
            name,
            response: json!({ "content": content }),
        }
    }

    fn content(&self) -> String {
        match self.response.get("content") {
            Some(Value::String(content)) => content.clone(),
            _ => self.response.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<ParametersSchema<GeminiDialect>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: GeminiContent,
}

/// A Gemini candidate, or a tool response addressed to Gemini
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleMessage {
    pub content: GeminiContent,
    pub tool_call_id: Option<String>,
}

impl MessageView for GoogleMessage {
    fn role(&self) -> Role {
        if self.is_tool_response() {
            return Role::Tool;
        }
        match self.content.role.as_deref() {
            Some(GEMINI_USER_ROLE) => Role::User,
            _ => Role::Assistant,
        }
    }

    fn content(&self) -> String {
        self.content
            .parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| match (&part.text, &part.function_response) {
                (Some(text), _) => Some(text.clone()),
                (None, Some(response)) => Some(response.content()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The function name doubles as the call id, since a `functionResponse`
    /// is matched to its call by name
    fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .parts
            .iter()
            .filter_map(|part| part.function_call.as_ref())
            .map(|call| {
                ToolCall::new(call.name.clone(), call.args.clone()).with_id(call.name.clone())
            })
            .collect()
    }

    fn is_tool_response(&self) -> bool {
        self.tool_call_id.is_some()
            || self
                .content
                .parts
                .iter()
                .any(|part| part.function_response.is_some())
    }

    fn tool_call_id(&self) -> Option<String> {
        self.tool_call_id.clone().or_else(|| {
            self.content
                .parts
                .iter()
                .find_map(|part| part.function_response.as_ref().map(|r| r.name.clone()))
        })
    }
}

pub struct GoogleProvider {
    client: Client,
    config: GoogleProviderConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_to_gemini_spec(
        &self,
        prompt: &str,
        messages: &[Message],
    ) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();
        // call id -> function name, for responses to calls other backends made
        let mut call_names: HashMap<String, String> = HashMap::new();

        for mut entry in normalize_messages(&self.config.system_prompt, messages, prompt) {
            match entry.role {
                Role::System => system_parts.push(GeminiPart::text(entry.content)),
                Role::Tool => {
                    entry.tool_call_id = entry
                        .tool_call_id
                        .map(|id| call_names.get(&id).cloned().unwrap_or(id));
                    contents.push(Self::entry_to_gemini_spec(entry));
                }
                _ => {
                    for call in &entry.tool_calls {
                        if let Some(id) = &call.id {
                            call_names.insert(id.clone(), call.name.clone());
                        }
                    }
                    contents.push(Self::entry_to_gemini_spec(entry));
                }
            }
        }

        let system_instruction = (!system_parts.is_empty()).then(|| GeminiContent {
            role: None,
            parts: system_parts,
        });
        (system_instruction, contents)
    }

    fn entry_to_gemini_spec(entry: ConversationEntry) -> GeminiContent {
        let role = match entry.role {
            Role::Assistant => GEMINI_MODEL_ROLE,
            _ => GEMINI_USER_ROLE,
        };

        let mut parts = Vec::with_capacity(entry.tool_calls.len() + 1);
        if entry.role == Role::Tool {
            // Gemini pairs a response with its call by function name
            let name = entry.tool_call_id.unwrap_or_default();
            parts.push(GeminiPart {
                function_response: Some(GeminiFunctionResponse::new(name, entry.content)),
                ..Default::default()
            });
        } else {
            if !entry.content.is_empty() {
                parts.push(GeminiPart::text(entry.content));
            }
            for call in entry.tool_calls {
                parts.push(GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        id: None,
                        name: call.name,
                        args: call.arguments,
                    }),
                    ..Default::default()
                });
            }
        }

        GeminiContent {
            role: Some(role.to_string()),
            parts,
        }
    }

    fn tools_to_gemini_spec(tools: &[Tool]) -> Vec<GeminiTool> {
        if tools.is_empty() {
            return Vec::new();
        }

        let function_declarations = tools
            .iter()
            .map(|tool| {
                // Gemini rejects OBJECT parameters without properties
                let parameters = (!tool.input_schema.properties.is_empty())
                    .then(|| convert_schema(&tool.input_schema));
                FunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters,
                }
            })
            .collect();

        vec![GeminiTool {
            function_declarations,
        }]
    }

    async fn post(&self, payload: &GenerateContentRequest) -> ProviderResult<GenerateContentResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(payload)
            .send()
            .await?;

        read_json(response).await
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<Message> {
        let (system_instruction, contents) = self.messages_to_gemini_spec(prompt, messages);
        let payload = GenerateContentRequest {
            contents,
            system_instruction,
            tools: Self::tools_to_gemini_spec(tools),
        };
        tracing::debug!(
            model = %self.config.model,
            contents = payload.contents.len(),
            tools = tools.len(),
            "sending gemini generateContent request"
        );

        let response = self.post(&payload).await?;
        let prompt_feedback = response.prompt_feedback;
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "gemini returned no candidates (prompt feedback: {})",
                prompt_feedback.unwrap_or(Value::Null)
            ))
        })?;

        Ok(Message::Google(GoogleMessage {
            content: candidate.content,
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
        let response = GeminiFunctionResponse::new(tool_call_id.to_string(), content.into_text()?);
        Ok(Message::Google(GoogleMessage {
            content: GeminiContent {
                role: Some(GEMINI_USER_ROLE.to_string()),
                parts: vec![GeminiPart {
                    function_response: Some(response),
                    ..Default::default()
                }],
            },
            tool_call_id: Some(tool_call_id.to_string()),
        }))
    }

    fn name(&self) -> &str {
        "google"
    }
}
