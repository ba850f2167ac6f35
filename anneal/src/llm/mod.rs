//! LLM client abstraction for collaborator-backed steps.
//!
//! Generator, critic, and reviser steps depend on a callable that returns
//! assistant text and optional tool calls; this module defines the trait and
//! its implementations: `MockLlm` (fixed or scripted responses) and
//! `ChatOpenAI` (Chat Completions API with a retry policy).

mod mock;
mod openai;
mod retry;

pub use mock::{MockLlm, MockResponse};
pub use openai::ChatOpenAI;
pub use retry::RetryPolicy;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::message::Message;

/// Tool choice mode for chat completions: when tools are present, controls
/// whether the model may choose (auto), must not use (none), or must use
/// (required).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    /// Model can pick between a message and tool calls. Default with tools.
    #[default]
    Auto,
    /// Model will not call any tool.
    None,
    /// Model must call one or more tools.
    Required,
}

impl std::str::FromStr for ToolChoiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            "required" => Ok(Self::Required),
            _ => Err(format!(
                "unknown tool_choice: {} (use auto, none, or required)",
                s
            )),
        }
    }
}

/// A tool the model may call, described by name, purpose, and JSON schema.
///
/// The critic exposes a single `approve` tool this way; a call to it is the
/// structured approval signal.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// One tool call returned by the model.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// Raw JSON argument string as returned by the API.
    pub arguments: String,
    pub id: Option<String>,
}

/// Token usage for one call (prompt + completion), when the provider reports it.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from one completion: assistant text and optional tool calls.
#[derive(Debug)]
pub struct LlmResponse {
    /// Assistant message content (plain text).
    pub content: String,
    /// Tool calls from this turn; empty means the model answered in text.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage, when available.
    pub usage: Option<LlmUsage>,
}

/// LLM client: given messages, returns assistant text and optional tool calls.
///
/// Implementations: [`MockLlm`] (tests and examples), [`ChatOpenAI`] (real
/// API). Backend unreachability surfaces as
/// `PipelineError::CollaboratorUnavailable`; retry, when configured, happens
/// inside the implementation, never in the loop controller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one turn: read messages, return content and optional tool calls.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, PipelineError>;
}
