use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::errors::ProviderResult;
use crate::models::message::{HistoryMessage, Message};
use crate::models::tool::{Tool, ToolContent};
use crate::providers::base::Provider;
use crate::providers::utils::{normalize_messages, ConversationEntry};

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    requests: Arc<Mutex<Vec<Vec<ConversationEntry>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The normalized conversations seen so far, one per call
    pub fn requests(&self) -> Vec<Vec<ConversationEntry>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> ProviderResult<Message> {
        self.requests
            .lock()
            .unwrap()
            .push(normalize_messages("", messages, prompt));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok(HistoryMessage::assistant().with_text("").into())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn supports_tools(&self) -> bool {
        true
    }

    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> ProviderResult<Message> {
        Ok(HistoryMessage::tool()
            .with_tool_result(tool_call_id, content.into_text()?)
            .into())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use serde_json::json;

    #[tokio::test]
    async fn test_tool_loop_against_mock() -> ProviderResult<()> {
        let provider = MockProvider::new(vec![
            HistoryMessage::assistant()
                .with_tool_use("call_1", "lookup", json!({"q": "rust"}))
                .into(),
            HistoryMessage::assistant().with_text("done").into(),
        ]);

        let mut history: Vec<Message> = Vec::new();
        let reply = provider.create_message("search rust", &history, &[]).await?;
        let call = reply.tool_calls().remove(0);
        assert_eq!(call.id.as_deref(), Some("call_1"));

        history.push(HistoryMessage::user().with_text("search rust").into());
        history.push(reply);
        history.push(provider.create_tool_response("call_1", json!({"hits": 3}).into())?);

        let reply = provider.create_message("", &history, &[]).await?;
        assert_eq!(reply.content(), "done");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let last = requests[1].last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.content, r#"{"hits":3}"#);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));

        // Out of scripted replies
        let reply = provider.create_message("again", &history, &[]).await?;
        assert_eq!(reply.content(), "");
        Ok(())
    }
}
