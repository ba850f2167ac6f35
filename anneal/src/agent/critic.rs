//! Critic: reviews the artifact and either approves or asks for revision.
//!
//! Approval is always structured. `LlmCritic` gives the model an `approve`
//! tool; calling it is the approval signal. The critique text is never
//! scanned for magic tokens.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::error::PipelineError;
use crate::llm::{LlmClient, ToolSpec};
use crate::message::Message;
use crate::pipeline::{Step, StepOutput};
use crate::state::Blackboard;
use crate::task::Task;

use super::generate::render_template;

/// The critic's decision for one review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The artifact meets the quality bar; no further revision is needed.
    Approved,
    /// The artifact needs work; the text is actionable feedback.
    Revise(String),
}

/// Reviews the current blackboard and produces a [`Verdict`].
#[async_trait]
pub trait Critic: Send + Sync {
    async fn review(&self, task: &Task, board: &Blackboard) -> Result<Verdict, PipelineError>;
}

/// The tool an [`LlmCritic`] exposes; calling it means approval.
fn approve_tool() -> ToolSpec {
    ToolSpec {
        name: "approve".to_string(),
        description: Some(
            "Call this only when the work fully meets the quality bar and needs no further \
             revision."
                .to_string(),
        ),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

/// LLM-backed critic.
///
/// Renders its instruction against the task and blackboard, invokes the
/// model with the `approve` tool attached, and maps the response: a call to
/// `approve` is [`Verdict::Approved`]; otherwise the text content is the
/// critique. A response with neither is malformed.
pub struct LlmCritic {
    name: String,
    llm: Arc<dyn LlmClient>,
    instruction: String,
}

impl LlmCritic {
    pub fn new(llm: Arc<dyn LlmClient>, instruction: impl Into<String>) -> Self {
        Self {
            name: "critic".to_string(),
            llm,
            instruction: instruction.into(),
        }
    }

    /// Sets the name used in error reports (builder).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The tool spec callers should attach when building their own client.
    pub fn tool_spec() -> ToolSpec {
        approve_tool()
    }
}

#[async_trait]
impl Critic for LlmCritic {
    async fn review(&self, task: &Task, board: &Blackboard) -> Result<Verdict, PipelineError> {
        let instruction = render_template(&self.instruction, &self.name, task, board)?;
        let response = self.llm.invoke(&[Message::system(instruction)]).await?;

        if response.tool_calls.iter().any(|tc| tc.name == "approve") {
            return Ok(Verdict::Approved);
        }
        if response.content.is_empty() {
            return Err(PipelineError::malformed(
                &self.name,
                "model returned neither an approve call nor critique text",
            ));
        }
        Ok(Verdict::Revise(response.content))
    }
}

/// Scripted critic for tests: pops verdicts in order, repeating the last.
pub struct ScriptedCritic {
    verdicts: Mutex<VecDeque<Verdict>>,
    last: Mutex<Option<Verdict>>,
}

impl ScriptedCritic {
    pub fn new(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into_iter().collect()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Critic for ScriptedCritic {
    async fn review(&self, _task: &Task, _board: &Blackboard) -> Result<Verdict, PipelineError> {
        let mut queue = self
            .verdicts
            .lock()
            .map_err(|_| PipelineError::ExecutionFailed("scripted critic lock poisoned".into()))?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| PipelineError::ExecutionFailed("scripted critic lock poisoned".into()))?;
        if let Some(verdict) = queue.pop_front() {
            *last = Some(verdict.clone());
            return Ok(verdict);
        }
        last.clone().ok_or_else(|| {
            PipelineError::ExecutionFailed("scripted critic has no verdicts".to_string())
        })
    }
}

/// The critic as a loop step.
///
/// Reads the artifact key, asks the critic, and maps the verdict: approval
/// terminates the loop (and clears any stale critique); a revision request
/// writes the critique key for the reviser to consume.
pub struct CriticStep {
    id: String,
    critic: Arc<dyn Critic>,
    artifact_key: String,
    critique_key: String,
}

impl CriticStep {
    pub fn new(
        id: impl Into<String>,
        critic: Arc<dyn Critic>,
        artifact_key: impl Into<String>,
        critique_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            critic,
            artifact_key: artifact_key.into(),
            critique_key: critique_key.into(),
        }
    }
}

#[async_trait]
impl Step for CriticStep {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, task: &Task, board: &Blackboard) -> Result<StepOutput, PipelineError> {
        if !board.contains_key(&self.artifact_key) {
            return Err(PipelineError::malformed(
                &self.id,
                format!("artifact key '{}' not on the blackboard", self.artifact_key),
            ));
        }
        match self.critic.review(task, board).await? {
            Verdict::Approved => Ok(StepOutput::unchanged()
                .clear(&self.critique_key)
                .terminate("approved")),
            Verdict::Revise(critique) => {
                Ok(StepOutput::unchanged().write_str(&self.critique_key, critique))
            }
        }
    }
}
