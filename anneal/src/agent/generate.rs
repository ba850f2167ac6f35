//! Generic prompt step: render an instruction template, call the LLM, write
//! the reply to one blackboard key.
//!
//! Covers the planner, writer, generator, retrieval, and enrichment shapes.
//! The template names its inputs with `{task}` and `{key}` placeholders; an
//! unresolvable placeholder is a wiring error and fails the step rather than
//! being silently coerced.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::pipeline::{Step, StepOutput};
use crate::state::Blackboard;
use crate::task::Task;

/// Renders `{task}` and `{key}` placeholders against the task and blackboard.
///
/// Non-string blackboard values render as compact JSON. A placeholder with no
/// matching key yields `MalformedOutput` naming the step and the key.
pub(crate) fn render_template(
    template: &str,
    step_id: &str,
    task: &Task,
    board: &Blackboard,
) -> Result<String, PipelineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            PipelineError::malformed(step_id, "unterminated placeholder in instruction template")
        })?;
        let name = &after[..close];
        if name == "task" {
            out.push_str(&task.description);
        } else {
            match board.get(name) {
                Some(serde_json::Value::String(s)) => out.push_str(s),
                Some(value) => out.push_str(&value.to_string()),
                None => {
                    return Err(PipelineError::malformed(
                        step_id,
                        format!("blackboard key not found for placeholder {{{name}}}"),
                    ));
                }
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// A step that prompts an LLM and writes the reply under `output_key`.
pub struct LlmStep {
    id: String,
    llm: Arc<dyn LlmClient>,
    instruction: String,
    output_key: String,
}

impl LlmStep {
    pub fn new(
        id: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        instruction: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            llm,
            instruction: instruction.into(),
            output_key: output_key.into(),
        }
    }
}

#[async_trait]
impl Step for LlmStep {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, task: &Task, board: &Blackboard) -> Result<StepOutput, PipelineError> {
        let instruction = render_template(&self.instruction, &self.id, task, board)?;
        let response = self.llm.invoke(&[Message::system(instruction)]).await?;
        if response.content.is_empty() {
            return Err(PipelineError::malformed(
                &self.id,
                "model returned empty content",
            ));
        }
        Ok(StepOutput::unchanged().write_str(&self.output_key, response.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use serde_json::json;

    /// **Scenario**: placeholders resolve from the task and the blackboard;
    /// non-string values render as JSON.
    #[test]
    fn render_resolves_task_and_board_keys() {
        let task = Task::new("a story about tides");
        let mut board = Blackboard::new();
        board.insert_str("plan", "three acts");
        board.insert("words", json!(800));

        let rendered = render_template(
            "Request: {task}. Outline: {plan}. Budget: {words}.",
            "writer",
            &task,
            &board,
        )
        .expect("render");
        assert_eq!(
            rendered,
            "Request: a story about tides. Outline: three acts. Budget: 800."
        );
    }

    /// **Scenario**: a placeholder with no matching key fails as MalformedOutput.
    #[test]
    fn render_missing_key_is_malformed() {
        let err = render_template("Outline: {plan}", "writer", &Task::new("t"), &Blackboard::new())
            .expect_err("missing key");
        assert!(matches!(
            err,
            PipelineError::MalformedOutput { ref step, .. } if step == "writer"
        ));
    }

    /// **Scenario**: an unterminated placeholder fails rather than rendering garbage.
    #[test]
    fn render_unterminated_placeholder_is_malformed() {
        let err = render_template("Outline: {plan", "writer", &Task::new("t"), &Blackboard::new())
            .expect_err("unterminated");
        assert!(matches!(err, PipelineError::MalformedOutput { .. }));
    }

    /// **Scenario**: the step writes the model reply under its output key.
    #[tokio::test]
    async fn writes_reply_to_output_key() {
        let llm = Arc::new(MockLlm::with_content("an outline"));
        let step = LlmStep::new("planner", llm, "Plan: {task}", "plan");

        let output = step
            .run(&Task::new("a story"), &Blackboard::new())
            .await
            .expect("run");
        assert_eq!(output.updates.get("plan"), Some(&json!("an outline")));
        assert!(output.clears.is_empty());
    }

    /// **Scenario**: empty model content fails the step.
    #[tokio::test]
    async fn empty_content_is_malformed() {
        let llm = Arc::new(MockLlm::with_content(""));
        let step = LlmStep::new("planner", llm, "Plan: {task}", "plan");

        let err = step
            .run(&Task::new("a story"), &Blackboard::new())
            .await
            .expect_err("empty content");
        assert!(matches!(err, PipelineError::MalformedOutput { .. }));
    }
}
