use async_trait::async_trait;

use crate::errors::ProviderResult;
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolContent};

/// A handle bound to one backend, one model and one system prompt
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send the history plus the new prompt and return the backend's reply.
    ///
    /// An empty `prompt` sends the history alone, which is how tool results
    /// are handed back to the model.
    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<Message>;

    /// Whether the bound model accepts tool definitions. Failures to find out
    /// count as "no".
    async fn supports_tools(&self) -> bool;

    /// Wrap a tool result so it can be appended to the history
    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> ProviderResult<Message>;

    fn name(&self) -> &str;
}
