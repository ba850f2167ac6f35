//! Sequential composition: an ordered list of steps, each run exactly once.
//!
//! The story pipeline is the canonical shape: planner → writer → refinement
//! loop. Output application, failure, cancellation, and streaming follow the
//! same rules as a single loop pass; a step that signals termination stops
//! the remaining sequence.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::PipelineError;
use crate::state::Blackboard;
use crate::stream::{PipelineEvent, StreamMode};
use crate::task::Task;

use super::logging::{
    log_cancelled, log_run_complete, log_run_error, log_run_start, log_step_complete,
    log_step_start,
};
use super::{
    BuildError, LoopFailure, LoopReport, Outcome, RunContext, Signal, Step, StepOutput,
};

/// Builder for [`Pipeline`]. Steps run once each, in registration order.
pub struct PipelineBuilder {
    id: String,
    steps: Vec<Arc<dyn Step>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            id: "pipeline".to_string(),
            steps: Vec::new(),
        }
    }

    /// Sets the pipeline's step id, used when it nests inside another runner.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Registers a step at the end of the sequence.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Registers an already-shared step.
    pub fn step_arc(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Validates the configuration and builds the pipeline.
    pub fn build(self) -> Result<Pipeline, BuildError> {
        if self.steps.is_empty() {
            return Err(BuildError::NoSteps);
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id().to_string()) {
                return Err(BuildError::DuplicateStep(step.id().to_string()));
            }
        }
        Ok(Pipeline {
            id: self.id,
            steps: self.steps,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered sequence of steps. Immutable once built; cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    id: String,
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs each step once in declared order.
    ///
    /// Each step's output commits before the next step starts, so failure or
    /// cancellation returns the board as of the last completed step. In the
    /// report, `iterations` counts completed steps; the outcome is
    /// `Escalated` when a step signalled termination (remaining steps are
    /// skipped) and `Exhausted` when the whole sequence ran.
    pub async fn run(
        &self,
        task: &Task,
        board: Blackboard,
        ctx: &RunContext,
    ) -> Result<LoopReport, LoopFailure> {
        log_run_start(&ctx.run_id, self.steps.len() as u32);
        let writer = ctx.event_writer();

        let mut committed = board;
        let mut completed: u32 = 0;

        for step in &self.steps {
            if ctx.is_cancelled() {
                log_cancelled(&ctx.run_id, None);
                return Ok(LoopReport {
                    blackboard: committed,
                    iterations: completed,
                    outcome: Outcome::Cancelled,
                    reason: None,
                });
            }

            log_step_start(&ctx.run_id, step.id());
            writer.emit_step_start(step.id()).await;

            let result = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    log_cancelled(&ctx.run_id, Some(step.id()));
                    return Ok(LoopReport {
                        blackboard: committed,
                        iterations: completed,
                        outcome: Outcome::Cancelled,
                        reason: None,
                    });
                }
                result = step.run_with_context(task, &committed, ctx) => result,
            };

            let output = match result {
                Ok(output) => output,
                Err(error) => {
                    writer.emit_step_end(step.id(), Err(error.to_string())).await;
                    log_run_error(&ctx.run_id, &error);
                    return Err(LoopFailure {
                        error,
                        blackboard: committed,
                        iterations: completed,
                    });
                }
            };

            committed.apply(&output.updates, &output.clears);
            completed += 1;

            log_step_complete(&ctx.run_id, step.id(), output.signal.is_terminate());
            writer.emit_step_end(step.id(), Ok(())).await;
            writer.emit_values(committed.clone()).await;
            writer.emit_updates(step.id(), committed.clone()).await;

            if let Signal::Terminate(reason) = output.signal {
                log_run_complete(&ctx.run_id, Outcome::Escalated, completed);
                return Ok(LoopReport {
                    blackboard: committed,
                    iterations: completed,
                    outcome: Outcome::Escalated,
                    reason: Some(reason),
                });
            }
        }

        log_run_complete(&ctx.run_id, Outcome::Exhausted, completed);
        Ok(LoopReport {
            blackboard: committed,
            iterations: completed,
            outcome: Outcome::Exhausted,
            reason: None,
        })
    }

    /// Streams the run, emitting [`PipelineEvent`]s via a channel-backed
    /// stream. The run itself is spawned; the final event is always
    /// `RunEnd` or `RunFailed`, whatever the enabled modes, so a consumer
    /// never mistakes a failed run for a successful empty one.
    pub fn stream(
        &self,
        task: Task,
        board: Blackboard,
        stream_mode: impl Into<HashSet<StreamMode>>,
    ) -> ReceiverStream<PipelineEvent> {
        let (tx, rx) = mpsc::channel(128);
        let runner = self.clone();
        let modes: HashSet<StreamMode> = stream_mode.into();

        tokio::spawn(async move {
            let ctx = RunContext::new().with_stream(tx.clone(), modes);
            let terminal = match runner.run(&task, board, &ctx).await {
                Ok(report) => PipelineEvent::RunEnd {
                    outcome: report.outcome,
                    reason: report.reason,
                },
                Err(failure) => PipelineEvent::RunFailed {
                    message: failure.to_string(),
                },
            };
            let _ = tx.send(terminal).await;
        });

        ReceiverStream::new(rx)
    }
}

/// A pipeline nests inside another runner as an ordinary step. Unlike a
/// refinement loop, a pipeline propagates a termination signal upward: the
/// outer sequence stops too.
#[async_trait]
impl Step for Pipeline {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, task: &Task, board: &Blackboard) -> Result<StepOutput, PipelineError> {
        self.run_with_context(task, board, &RunContext::new()).await
    }

    async fn run_with_context(
        &self,
        task: &Task,
        board: &Blackboard,
        ctx: &RunContext,
    ) -> Result<StepOutput, PipelineError> {
        let report = self
            .run(task, board.clone(), ctx)
            .await
            .map_err(|failure| failure.error)?;
        let mut output = StepOutput::diff(board, &report.blackboard);
        if report.outcome == Outcome::Escalated {
            if let Some(reason) = report.reason {
                output.signal = Signal::Terminate(reason);
            }
        }
        Ok(output)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("steps", &self.steps.iter().map(|s| s.id()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct WriteStep {
        id: &'static str,
        key: &'static str,
        value: &'static str,
    }

    #[async_trait]
    impl Step for WriteStep {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(
            &self,
            _task: &Task,
            _board: &Blackboard,
        ) -> Result<StepOutput, PipelineError> {
            Ok(StepOutput::unchanged().write_str(self.key, self.value))
        }
    }

    struct TerminatingStep;

    #[async_trait]
    impl Step for TerminatingStep {
        fn id(&self) -> &str {
            "gate"
        }

        async fn run(
            &self,
            _task: &Task,
            _board: &Blackboard,
        ) -> Result<StepOutput, PipelineError> {
            Ok(StepOutput::unchanged().terminate("stop here"))
        }
    }

    /// **Scenario**: steps run once each in order, later writes overwrite earlier ones.
    #[tokio::test]
    async fn runs_steps_once_in_order() {
        let pipeline = Pipeline::builder()
            .step(WriteStep {
                id: "planner",
                key: "plan",
                value: "outline",
            })
            .step(WriteStep {
                id: "writer",
                key: "current_story",
                value: "draft",
            })
            .step(WriteStep {
                id: "polisher",
                key: "current_story",
                value: "polished",
            })
            .build()
            .expect("valid pipeline");

        let report = pipeline
            .run(&Task::new("t"), Blackboard::new(), &RunContext::new())
            .await
            .expect("success");
        assert_eq!(report.iterations, 3);
        assert_eq!(report.outcome, Outcome::Exhausted);
        assert_eq!(report.blackboard.get_str("plan"), Some("outline"));
        assert_eq!(report.blackboard.get_str("current_story"), Some("polished"));
    }

    /// **Scenario**: a termination signal skips the remaining sequence.
    #[tokio::test]
    async fn termination_stops_remaining_steps() {
        let pipeline = Pipeline::builder()
            .step(WriteStep {
                id: "first",
                key: "a",
                value: "1",
            })
            .step(TerminatingStep)
            .step(WriteStep {
                id: "never",
                key: "b",
                value: "2",
            })
            .build()
            .expect("valid pipeline");

        let report = pipeline
            .run(&Task::new("t"), Blackboard::new(), &RunContext::new())
            .await
            .expect("success");
        assert_eq!(report.outcome, Outcome::Escalated);
        assert_eq!(report.reason.as_deref(), Some("stop here"));
        assert_eq!(report.iterations, 2);
        assert_eq!(report.blackboard.get_str("a"), Some("1"));
        assert!(!report.blackboard.contains_key("b"));
    }

    /// **Scenario**: a failing step returns the board as of the last completed step.
    #[tokio::test]
    async fn failure_keeps_completed_steps() {
        struct FailingStep;

        #[async_trait]
        impl Step for FailingStep {
            fn id(&self) -> &str {
                "failing"
            }

            async fn run(
                &self,
                _task: &Task,
                _board: &Blackboard,
            ) -> Result<StepOutput, PipelineError> {
                Err(PipelineError::ExecutionFailed("boom".to_string()))
            }
        }

        let pipeline = Pipeline::builder()
            .step(WriteStep {
                id: "first",
                key: "a",
                value: "1",
            })
            .step(FailingStep)
            .build()
            .expect("valid pipeline");

        let failure = pipeline
            .run(&Task::new("t"), Blackboard::new(), &RunContext::new())
            .await
            .expect_err("failure");
        assert_eq!(failure.iterations, 1);
        assert_eq!(failure.blackboard.get_str("a"), Some("1"));
    }

    /// **Scenario**: a failing run surfaces on the stream even when only
    /// Values mode is enabled; the final event carries the failure message.
    #[tokio::test]
    async fn stream_surfaces_failure_in_values_mode() {
        use tokio_stream::StreamExt;

        struct UnreachableStep;

        #[async_trait]
        impl Step for UnreachableStep {
            fn id(&self) -> &str {
                "generator"
            }

            async fn run(
                &self,
                _task: &Task,
                _board: &Blackboard,
            ) -> Result<StepOutput, PipelineError> {
                Err(PipelineError::CollaboratorUnavailable(
                    "connection refused".to_string(),
                ))
            }
        }

        let pipeline = Pipeline::builder()
            .step(UnreachableStep)
            .build()
            .expect("valid pipeline");

        let mut stream = pipeline.stream(Task::new("t"), Blackboard::new(), [StreamMode::Values]);
        let mut failure = None;
        while let Some(event) = stream.next().await {
            if let PipelineEvent::RunFailed { message } = event {
                failure = Some(message);
            }
        }
        let message = failure.expect("failure reported on the stream");
        assert!(message.contains("collaborator unavailable"), "{}", message);
    }

    /// **Scenario**: an empty pipeline does not build.
    #[test]
    fn build_rejects_empty_pipeline() {
        assert!(matches!(
            Pipeline::builder().build(),
            Err(BuildError::NoSteps)
        ));
    }

    /// **Scenario**: nested as a step, a pipeline propagates its termination signal upward.
    #[tokio::test]
    async fn nested_pipeline_propagates_termination() {
        let inner = Pipeline::builder()
            .id("inner")
            .step(WriteStep {
                id: "w",
                key: "k",
                value: "v",
            })
            .step(TerminatingStep)
            .build()
            .expect("valid pipeline");

        let output = inner
            .run(&Task::new("t"), Blackboard::new(), &RunContext::new())
            .await
            .expect("success");
        assert_eq!(output.outcome, Outcome::Escalated);

        let step_output = Step::run(&inner, &Task::new("t"), &Blackboard::new())
            .await
            .expect("nested run");
        assert_eq!(step_output.signal, Signal::Terminate("stop here".to_string()));
        assert_eq!(step_output.updates.get("k"), Some(&json!("v")));
    }
}
