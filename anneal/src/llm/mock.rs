//! Mock LLM for tests and examples.
//!
//! Returns a fixed assistant message and optional fixed tool calls, or a
//! scripted sequence of responses for multi-pass scenarios (e.g. a critic
//! that revises on the first pass and approves on the second).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::message::Message;

use super::{LlmClient, LlmResponse, ToolCall};

/// One canned response: content plus optional tool calls.
#[derive(Clone, Debug, Default)]
pub struct MockResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl MockResponse {
    /// Plain text response, no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A single tool call with empty arguments, no text.
    pub fn tool_call(name: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments: "{}".to_string(),
                id: Some("call-1".to_string()),
            }],
        }
    }
}

/// Mock LLM: fixed or scripted responses.
///
/// Fixed mode returns the same response on every call. Scripted mode pops
/// responses in order; once the script is exhausted the last response
/// repeats. The call counter is observable for assertions.
pub struct MockLlm {
    responses: Mutex<Vec<MockResponse>>,
    calls: AtomicUsize,
}

impl MockLlm {
    /// Mock that always returns the same plain-text content.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self::scripted(vec![MockResponse::text(content)])
    }

    /// Mock that plays `responses` in order, repeating the last one.
    pub fn scripted(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of invoke() calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[Message]) -> Result<LlmResponse, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self
            .responses
            .lock()
            .map_err(|_| PipelineError::ExecutionFailed("mock lock poisoned".to_string()))?;
        let response = responses
            .get(call)
            .or_else(|| responses.last())
            .cloned()
            .unwrap_or_default();
        Ok(LlmResponse {
            content: response.content,
            tool_calls: response.tool_calls,
            usage: None,
        })
    }
}
