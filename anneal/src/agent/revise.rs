//! Reviser: applies the current critique to the artifact and consumes it.
//!
//! When no feedback is present the reviser is a no-op pass-through; this is
//! what makes the approving pass harmless, since the critic clears the
//! critique when it approves.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::pipeline::{Step, StepOutput};
use crate::state::Blackboard;
use crate::task::Task;

use super::generate::render_template;

/// Rewrites the artifact from the critique, then clears the critique key so
/// feedback never leaks into the next iteration.
pub struct ReviserStep {
    id: String,
    llm: Arc<dyn LlmClient>,
    instruction: String,
    artifact_key: String,
    critique_key: String,
}

impl ReviserStep {
    pub fn new(
        id: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        instruction: impl Into<String>,
        artifact_key: impl Into<String>,
        critique_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            llm,
            instruction: instruction.into(),
            artifact_key: artifact_key.into(),
            critique_key: critique_key.into(),
        }
    }
}

#[async_trait]
impl Step for ReviserStep {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, task: &Task, board: &Blackboard) -> Result<StepOutput, PipelineError> {
        if !board.contains_key(&self.critique_key) {
            return Ok(StepOutput::unchanged());
        }
        if !board.contains_key(&self.artifact_key) {
            return Err(PipelineError::malformed(
                &self.id,
                format!("artifact key '{}' not on the blackboard", self.artifact_key),
            ));
        }

        let instruction = render_template(&self.instruction, &self.id, task, board)?;
        let response = self.llm.invoke(&[Message::system(instruction)]).await?;
        if response.content.is_empty() {
            return Err(PipelineError::malformed(
                &self.id,
                "model returned empty content",
            ));
        }
        Ok(StepOutput::unchanged()
            .write_str(&self.artifact_key, response.content)
            .clear(&self.critique_key))
    }
}
