use serde::{Deserialize, Serialize};

use super::content::ContentBlock;
use super::role::Role;
use super::tool::ToolCall;
use crate::providers::anthropic::AnthropicMessage;
use crate::providers::google::GoogleMessage;
use crate::providers::ollama::OllamaMessage;
use crate::providers::openai::OpenAiMessage;

/// The accessors every message answers, whichever backend produced it.
pub trait MessageView {
    fn role(&self) -> Role;

    /// Textual content, empty when there is none
    fn content(&self) -> String;

    fn tool_calls(&self) -> Vec<ToolCall>;

    fn is_tool_response(&self) -> bool;

    /// The call this message answers, if it is a tool response
    fn tool_call_id(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A prior turn of the conversation in backend-neutral form
pub struct HistoryMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl HistoryMessage {
    pub fn new(role: Role) -> Self {
        HistoryMessage {
            role,
            content: Vec::new(),
        }
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any block to the message
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_block(ContentBlock::text(text))
    }

    pub fn with_tool_use<I: Into<String>, N: Into<String>>(
        self,
        id: I,
        name: N,
        input: serde_json::Value,
    ) -> Self {
        self.with_block(ContentBlock::tool_use(id, name, input))
    }

    pub fn with_tool_result<I: Into<String>, S: Into<String>>(self, tool_use_id: I, text: S) -> Self {
        self.with_block(ContentBlock::tool_result(tool_use_id, text))
    }

    fn first_tool_result(&self) -> Option<(&str, &str)> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::ToolResult { tool_use_id, text } => {
                Some((tool_use_id.as_str(), text.as_str()))
            }
            _ => None,
        })
    }
}

impl MessageView for HistoryMessage {
    fn role(&self) -> Role {
        self.role
    }

    fn content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::new(name.clone(), input.clone()).with_id(id.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn is_tool_response(&self) -> bool {
        self.role == Role::Tool || self.content.iter().any(ContentBlock::is_tool_result)
    }

    fn tool_call_id(&self) -> Option<String> {
        self.first_tool_result().map(|(id, _)| id.to_string())
    }
}

/// A message to or from a provider.
///
/// History turns are backend-neutral; replies keep the shape their backend
/// returned and are wrapped without further normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    History(HistoryMessage),
    Anthropic(AnthropicMessage),
    OpenAi(OpenAiMessage),
    Google(GoogleMessage),
    Ollama(OllamaMessage),
}

impl Message {
    fn view(&self) -> &dyn MessageView {
        match self {
            Message::History(message) => message,
            Message::Anthropic(message) => message,
            Message::OpenAi(message) => message,
            Message::Google(message) => message,
            Message::Ollama(message) => message,
        }
    }

    pub fn role(&self) -> Role {
        self.view().role()
    }

    pub fn content(&self) -> String {
        self.view().content()
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.view().tool_calls()
    }

    pub fn is_tool_response(&self) -> bool {
        self.view().is_tool_response()
    }

    pub fn tool_call_id(&self) -> Option<String> {
        self.view().tool_call_id()
    }

    /// Content of a tool response: the first `tool_result` block of a history
    /// message, falling back to the generic content when that is empty or absent.
    pub fn tool_response_content(&self) -> String {
        if let Message::History(history) = self {
            if let Some((_, text)) = history.first_tool_result() {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
        self.content()
    }
}

impl From<HistoryMessage> for Message {
    fn from(message: HistoryMessage) -> Self {
        Message::History(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_content_joins_text_blocks() {
        let message: Message = HistoryMessage::user()
            .with_text("first")
            .with_tool_result("call_1", "ignored")
            .with_text("second")
            .into();

        assert_eq!(message.role(), Role::User);
        assert_eq!(message.content(), "first\nsecond");
        assert!(message.is_tool_response());
        assert_eq!(message.tool_call_id().as_deref(), Some("call_1"));
    }

    #[test]
    fn test_history_tool_calls_from_tool_use_blocks() {
        let message: Message = HistoryMessage::assistant()
            .with_text("let me check")
            .with_tool_use("toolu_1", "lookup", json!({"q": "x"}))
            .into();

        let calls = message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id.as_deref(), Some("toolu_1"));
        assert_eq!(calls[0].name, "lookup");
        assert_eq!(calls[0].arguments, json!({"q": "x"}));
        assert!(!message.is_tool_response());
    }

    #[test]
    fn test_tool_response_content_prefers_first_tool_result() {
        let message: Message = HistoryMessage::tool()
            .with_text("fallback")
            .with_tool_result("a", "from block")
            .with_tool_result("b", "second block")
            .into();
        assert_eq!(message.tool_response_content(), "from block");
    }

    #[test]
    fn test_tool_response_content_falls_back_to_text() {
        let message: Message = HistoryMessage::tool()
            .with_tool_result("a", "")
            .with_text("fallback")
            .into();
        assert_eq!(message.tool_response_content(), "fallback");

        let empty: Message = HistoryMessage::tool().with_tool_result("a", "").into();
        assert_eq!(empty.tool_response_content(), "");
    }
}
