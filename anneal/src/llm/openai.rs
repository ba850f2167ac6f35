//! OpenAI Chat Completions client implementing `LlmClient` (ChatOpenAI).
//!
//! Uses the real OpenAI Chat Completions API. Requires `OPENAI_API_KEY` (or
//! explicit config; `OPENAI_BASE_URL` selects a compatible backend). Optional
//! tools can be set for function calling; when present, the API may return
//! `tool_calls` in the response.
//!
//! Transient API failures are retried here according to the configured
//! [`RetryPolicy`]. The loop controller never retries: a call that survives
//! the policy fails the step.

use async_trait::async_trait;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::message::Message;

use super::{LlmClient, LlmResponse, LlmUsage, RetryPolicy, ToolCall, ToolChoiceMode, ToolSpec};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
        ChatCompletionToolChoiceOption, ChatCompletionTools, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, FunctionObject, ToolChoiceOptions,
    },
    Client,
};

/// OpenAI Chat Completions client implementing `LlmClient`.
///
/// Uses `OPENAI_API_KEY` from the environment by default; or provide config
/// via [`ChatOpenAI::with_config`]. Optionally set tools (the critic sets its
/// `approve` tool this way) and a retry policy for transient failures.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    tools: Option<Vec<ToolSpec>>,
    temperature: Option<f32>,
    tool_choice: Option<ToolChoiceMode>,
    retry: RetryPolicy,
}

impl ChatOpenAI {
    /// Build client with default config (API key from `OPENAI_API_KEY` env).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            tools: None,
            temperature: None,
            tool_choice: None,
            retry: RetryPolicy::None,
        }
    }

    /// Build client with custom config (e.g. custom API key or base URL).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            tools: None,
            temperature: None,
            tool_choice: None,
            retry: RetryPolicy::None,
        }
    }

    /// Set tools for this completion (enables tool_calls in the response).
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set temperature (0–2). Lower values are more deterministic.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set tool choice mode (auto, none, required).
    pub fn with_tool_choice(mut self, mode: ToolChoiceMode) -> Self {
        self.tool_choice = Some(mode);
        self
    }

    /// Set the retry policy for transient API failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the chat completions URL used for logging (base from
    /// `OPENAI_BASE_URL` or `OPENAI_API_BASE` env, else default). Does not
    /// append /v1 when the base already ends with /v1.
    fn chat_completions_url() -> String {
        let base = std::env::var("OPENAI_BASE_URL")
            .or_else(|_| std::env::var("OPENAI_API_BASE"))
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let base = base.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Convert our `Message` list to OpenAI request messages.
    fn messages_to_request(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System(s) => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(s.as_str()),
                ),
                Message::User(s) => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(s.as_str()),
                ),
                Message::Assistant(s) => {
                    ChatCompletionRequestMessage::Assistant((s.as_str()).into())
                }
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
    ) -> Result<CreateChatCompletionRequest, PipelineError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::messages_to_request(messages));

        if let Some(ref tools) = self.tools {
            let chat_tools: Vec<ChatCompletionTools> = tools
                .iter()
                .map(|t| {
                    ChatCompletionTools::Function(ChatCompletionTool {
                        function: FunctionObject {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: Some(t.input_schema.clone()),
                            ..Default::default()
                        },
                    })
                })
                .collect();
            args.tools(chat_tools);
        }

        if let Some(t) = self.temperature {
            args.temperature(t);
        }

        if let Some(mode) = self.tool_choice {
            let opt = match mode {
                ToolChoiceMode::Auto => ToolChoiceOptions::Auto,
                ToolChoiceMode::None => ToolChoiceOptions::None,
                ToolChoiceMode::Required => ToolChoiceOptions::Required,
            };
            args.tool_choice(ChatCompletionToolChoiceOption::Mode(opt));
        }

        args.build().map_err(|e| {
            PipelineError::ExecutionFailed(format!("OpenAI request build failed: {}", e))
        })
    }

    async fn invoke_once(
        &self,
        request: CreateChatCompletionRequest,
        trace_id: &Uuid,
    ) -> Result<LlmResponse, PipelineError> {
        let url = Self::chat_completions_url();
        if let Ok(js) = serde_json::to_string_pretty(&request) {
            trace!(%trace_id, url = %url, request = %js, "OpenAI request body");
        }

        let response = self.client.chat().create(request).await.map_err(|e| {
            PipelineError::CollaboratorUnavailable(format!("OpenAI API error: {}", e))
        })?;

        if let Ok(js) = serde_json::to_string_pretty(&response) {
            trace!(%trace_id, url = %url, response = %js, "OpenAI response body");
        }

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            PipelineError::ExecutionFailed("OpenAI returned no choices".to_string())
        })?;

        let msg = choice.message;
        let content = msg.content.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                if let ChatCompletionMessageToolCalls::Function(f) = tc {
                    Some(ToolCall {
                        name: f.function.name,
                        arguments: f.function.arguments,
                        id: Some(f.id),
                    })
                } else {
                    None
                }
            })
            .collect();

        let usage = response.usage.map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            content,
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, PipelineError> {
        let trace_id = Uuid::new_v4();
        let tools_count = self.tools.as_ref().map(|t| t.len()).unwrap_or(0);
        debug!(
            %trace_id,
            model = %self.model,
            message_count = messages.len(),
            tools_count,
            temperature = ?self.temperature,
            tool_choice = ?self.tool_choice,
            "OpenAI chat create"
        );

        let mut attempt = 0;
        loop {
            let request = self.build_request(messages)?;
            match self.invoke_once(request, &trace_id).await {
                Ok(response) => return Ok(response),
                // Only backend unreachability is transient; request build
                // and malformed-response errors fail immediately.
                Err(PipelineError::CollaboratorUnavailable(detail)) => {
                    if self.retry.should_retry(attempt) {
                        let delay = self.retry.delay(attempt);
                        debug!(%trace_id, attempt, ?delay, %detail, "Retrying OpenAI call");
                        if delay > std::time::Duration::ZERO {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                        continue;
                    }
                    return Err(PipelineError::CollaboratorUnavailable(detail));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
