//! Step trait: one unit of work in a pipeline.
//!
//! Receives the task and a read-only view of the blackboard, returns a
//! `StepOutput` (declared writes, consumed keys, and a control signal). The
//! runner applies the output only after the step future completes, so a
//! failed or cancelled step leaves no partial mutation behind.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PipelineError;
use crate::state::Blackboard;
use crate::task::Task;

use super::{RunContext, Signal};

/// Output of one step invocation: declared writes, consumed keys, signal.
///
/// Keys not named in `updates` or `clears` are preserved verbatim by the
/// runner. A write wins over a clear for the same key.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Keys this step writes (inserted or overwritten).
    pub updates: BTreeMap<String, Value>,
    /// Keys this step consumes (removed from the blackboard).
    pub clears: Vec<String>,
    /// Control signal; `Signal::Continue` unless set via `terminate`.
    pub signal: Signal,
}

impl StepOutput {
    /// An output with no writes, no clears, and `Signal::Continue`.
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Adds a write (builder).
    pub fn write(mut self, key: impl Into<String>, value: Value) -> Self {
        self.updates.insert(key.into(), value);
        self
    }

    /// Adds a string write (builder).
    pub fn write_str(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.write(key, Value::String(value.into()))
    }

    /// Marks a key as consumed (builder).
    pub fn clear(mut self, key: impl Into<String>) -> Self {
        self.clears.push(key.into());
        self
    }

    /// Requests early termination with the given reason (builder).
    pub fn terminate(mut self, reason: impl Into<String>) -> Self {
        self.signal = Signal::Terminate(reason.into());
        self
    }

    /// Expresses `after` relative to `before`: changed keys become writes,
    /// removed keys become clears. Nested runners use this to report a
    /// sub-run's net effect to the outer runner's output application.
    pub fn diff(before: &Blackboard, after: &Blackboard) -> Self {
        let mut output = StepOutput::unchanged();
        for (key, value) in after.iter() {
            if before.get(key) != Some(value) {
                output.updates.insert(key.to_string(), value.clone());
            }
        }
        for key in before.keys() {
            if !after.contains_key(key) {
                output.clears.push(key.to_string());
            }
        }
        output
    }
}

/// One step in a pipeline: (task, blackboard) in, `StepOutput` out.
///
/// Implemented by collaborator-backed steps (generator, critic, reviser) and
/// by the runners themselves (`RefineLoop` and `Pipeline` implement `Step`,
/// so loops nest inside sequences). The runner treats step internals as
/// opaque: a step may block on model inference, tool calls, or network I/O;
/// it must eventually return an output or a reported error.
///
/// **Interaction**: Registered with `LoopBuilder::step` / `Pipeline::step`;
/// invoked by `RefineLoop::run` and `Pipeline::run`.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step id (e.g. `"critic"`, `"reviser"`). Must be unique within a runner.
    fn id(&self) -> &str;

    /// One invocation: read task and blackboard, return declared output.
    async fn run(&self, task: &Task, board: &Blackboard) -> Result<StepOutput, PipelineError>;

    /// Context-aware variant (streaming, cancellation-aware sub-runs).
    ///
    /// Default implementation calls `run` and ignores the context.
    async fn run_with_context(
        &self,
        task: &Task,
        board: &Blackboard,
        _ctx: &RunContext,
    ) -> Result<StepOutput, PipelineError> {
        self.run(task, board).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Scenario**: builder methods accumulate writes, clears, and the signal.
    #[test]
    fn step_output_builder() {
        let out = StepOutput::unchanged()
            .write("current_story", json!("revised"))
            .clear("critique")
            .terminate("approved");
        assert_eq!(out.updates.get("current_story"), Some(&json!("revised")));
        assert_eq!(out.clears, vec!["critique".to_string()]);
        assert_eq!(out.signal, Signal::Terminate("approved".to_string()));
    }

    /// **Scenario**: unchanged() declares nothing and continues.
    #[test]
    fn step_output_unchanged_is_empty() {
        let out = StepOutput::unchanged();
        assert!(out.updates.is_empty());
        assert!(out.clears.is_empty());
        assert_eq!(out.signal, Signal::Continue);
    }

    /// **Scenario**: diff reports changed keys as writes and removed keys as
    /// clears, ignoring untouched keys.
    #[test]
    fn step_output_diff_writes_and_clears() {
        let mut before = Blackboard::new();
        before.insert_str("current_story", "draft");
        before.insert_str("critique", "tighten the ending");
        before.insert_str("plan", "three acts");

        let mut after = Blackboard::new();
        after.insert_str("current_story", "revised draft");
        after.insert_str("plan", "three acts");

        let out = StepOutput::diff(&before, &after);
        assert_eq!(
            out.updates.get("current_story"),
            Some(&json!("revised draft"))
        );
        assert!(!out.updates.contains_key("plan"), "untouched key not reported");
        assert_eq!(out.clears, vec!["critique".to_string()]);
        assert_eq!(out.signal, Signal::Continue);
    }
}
