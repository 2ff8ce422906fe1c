//! Deterministic in-process client that replays queued responses.
//!
//! Used for offline runs and for exercising the agent loop without a model.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::types::ToolCall;
use finagent_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Client returning pre-programmed responses in order.
///
/// Once the queue is empty, the fallback answer (if any) is returned for
/// every further call.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<LlmResponse>>,
    fallback: Option<String>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call with the same text.
    pub fn with_fallback(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    /// Queue a plain text answer.
    pub fn push_text(self, text: impl Into<String>) -> Self {
        self.push(LlmResponse::text(text, "scripted"))
    }

    /// Queue a response requesting tool calls.
    pub fn push_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        let mut response = LlmResponse::text("", "scripted");
        response.tool_calls = calls;
        self.push(response)
    }

    fn push(self, response: LlmResponse) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_response(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        let queued = self
            .responses
            .lock()
            .map_err(|_| AppError::Llm("Scripted client poisoned".to_string()))?
            .pop_front();

        match (queued, &self.fallback) {
            (Some(response), _) => Ok(response),
            (None, Some(text)) => Ok(LlmResponse::text(text.clone(), "scripted")),
            (None, None) => Err(AppError::Llm("No scripted response left".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.next_response(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_fallback() {
        let client = ScriptedClient::with_fallback("done")
            .push_text("first")
            .push_text("second");
        let request = LlmRequest::new("q", "m");

        assert_eq!(client.complete(&request).await.unwrap().content, "first");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert_eq!(client.complete(&request).await.unwrap().content, "done");
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback_errors() {
        let client = ScriptedClient::new();
        assert!(client.complete(&LlmRequest::new("q", "m")).await.is_err());
    }
}
