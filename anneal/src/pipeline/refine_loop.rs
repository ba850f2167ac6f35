//! The bounded refinement loop: runs its steps in declared order for at most
//! `max_iterations` passes, applying each step's output to a working board.
//!
//! Built by `LoopBuilder::build`. A pass always completes in full once
//! started (except on step failure or cancellation); the termination signal
//! is honored only at pass boundaries, so the reviser still runs after the
//! critic approves and the committed artifact reflects the whole pass.

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
    log_cancelled, log_pass_complete, log_pass_start, log_run_complete, log_run_error,
    log_run_start, log_step_complete, log_step_start,
};
use super::{
    BuildError, LoopFailure, LoopReport, Outcome, RunContext, Signal, Step, StepOutput,
};

/// Builder for [`RefineLoop`]. Steps run in registration order.
pub struct LoopBuilder {
    id: String,
    steps: Vec<Arc<dyn Step>>,
    max_iterations: u32,
}

impl LoopBuilder {
    /// Creates a builder with the given iteration cap.
    ///
    /// A cap of zero is valid: the loop runs zero passes and ends
    /// `Exhausted` with the board unchanged. The cap is never "run forever".
    pub fn new(max_iterations: u32) -> Self {
        Self {
            id: "refine_loop".to_string(),
            steps: Vec::new(),
            max_iterations,
        }
    }

    /// Sets the loop's step id, used when the loop nests inside a pipeline.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Registers a step at the end of the declared order.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Registers an already-shared step.
    pub fn step_arc(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Validates the configuration and builds the loop.
    ///
    /// Fails when no steps are registered or two steps share an id.
    pub fn build(self) -> Result<RefineLoop, BuildError> {
        if self.steps.is_empty() {
            return Err(BuildError::NoSteps);
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id().to_string()) {
                return Err(BuildError::DuplicateStep(step.id().to_string()));
            }
        }
        Ok(RefineLoop {
            id: self.id,
            steps: self.steps,
            max_iterations: self.max_iterations,
        })
    }
}

/// Bounded refinement loop. Immutable once built; cheap to clone.
///
/// Run states: running → `Escalated` | `Exhausted` | failed, with
/// `Cancelled` as the non-failure early stop. Exactly one terminal outcome
/// per run; the blackboard travels with every outcome, including failure.
#[derive(Clone)]
pub struct RefineLoop {
    id: String,
    steps: Vec<Arc<dyn Step>>,
    max_iterations: u32,
}

impl RefineLoop {
    /// The iteration cap this loop was built with.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Runs the loop over `board` until a termination signal, the iteration
    /// cap, cancellation, or a step failure.
    ///
    /// The signal is honored at the end of the pass that produced it: that
    /// pass commits in full and no further pass starts. A step failure
    /// discards the failed pass's partial updates and returns the board as
    /// of the last committed pass inside the [`LoopFailure`]. The controller
    /// never retries a failed step.
    pub async fn run(
        &self,
        task: &Task,
        board: Blackboard,
        ctx: &RunContext,
    ) -> Result<LoopReport, LoopFailure> {
        log_run_start(&ctx.run_id, self.max_iterations);
        let writer = ctx.event_writer();

        let mut committed = board;
        let mut iterations: u32 = 0;

        for pass in 1..=self.max_iterations {
            if ctx.is_cancelled() {
                log_cancelled(&ctx.run_id, None);
                return Ok(LoopReport {
                    blackboard: committed,
                    iterations,
                    outcome: Outcome::Cancelled,
                    reason: None,
                });
            }

            log_pass_start(&ctx.run_id, pass);
            writer.emit_pass_start(pass).await;

            // Updates accumulate on the working board; it becomes the
            // committed board only when the whole pass finishes.
            let mut working = committed.clone();
            let mut termination: Option<String> = None;

            for step in &self.steps {
                log_step_start(&ctx.run_id, step.id());
                writer.emit_step_start(step.id()).await;

                let result = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        log_cancelled(&ctx.run_id, Some(step.id()));
                        return Ok(LoopReport {
                            blackboard: working,
                            iterations,
                            outcome: Outcome::Cancelled,
                            reason: None,
                        });
                    }
                    result = step.run_with_context(task, &working, ctx) => result,
                };

                let output = match result {
                    Ok(output) => output,
                    Err(error) => {
                        writer.emit_step_end(step.id(), Err(error.to_string())).await;
                        log_run_error(&ctx.run_id, &error);
                        return Err(LoopFailure {
                            error,
                            blackboard: committed,
                            iterations,
                        });
                    }
                };

                working.apply(&output.updates, &output.clears);
                if let Signal::Terminate(reason) = output.signal {
                    if termination.is_none() {
                        termination = Some(reason);
                    }
                }

                log_step_complete(&ctx.run_id, step.id(), termination.is_some());
                writer.emit_step_end(step.id(), Ok(())).await;
                writer.emit_values(working.clone()).await;
                writer.emit_updates(step.id(), working.clone()).await;
            }

            committed = working;
            iterations = pass;
            log_pass_complete(&ctx.run_id, pass);
            writer.emit_pass_end(pass).await;

            if let Some(reason) = termination {
                log_run_complete(&ctx.run_id, Outcome::Escalated, iterations);
                return Ok(LoopReport {
                    blackboard: committed,
                    iterations,
                    outcome: Outcome::Escalated,
                    reason: Some(reason),
                });
            }
        }

        log_run_complete(&ctx.run_id, Outcome::Exhausted, iterations);
        Ok(LoopReport {
            blackboard: committed,
            iterations,
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

/// A loop nests inside a pipeline as an ordinary step. The loop consumes its
/// own escalation: it reports `Continue` upward with its final updates, and
/// only a step failure propagates.
#[async_trait]
impl Step for RefineLoop {
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
        Ok(StepOutput::diff(board, &report.blackboard))
    }
}

impl std::fmt::Debug for RefineLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefineLoop")
            .field("id", &self.id)
            .field("steps", &self.steps.iter().map(|s| s.id()).collect::<Vec<_>>())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Appends its id to a `trace` array and bumps a counter key.
    struct TraceStep {
        id: &'static str,
    }

    #[async_trait]
    impl Step for TraceStep {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(
            &self,
            _task: &Task,
            board: &Blackboard,
        ) -> Result<StepOutput, PipelineError> {
            let mut trace: Vec<String> = board
                .get("trace")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();
            trace.push(self.id.to_string());
            Ok(StepOutput::unchanged().write("trace", json!(trace)))
        }
    }

    /// Terminates on the nth invocation (1-based), continues otherwise.
    struct TerminateOnCall {
        id: &'static str,
        nth: u32,
        calls: AtomicU32,
    }

    impl TerminateOnCall {
        fn new(id: &'static str, nth: u32) -> Self {
            Self {
                id,
                nth,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Step for TerminateOnCall {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(
            &self,
            _task: &Task,
            _board: &Blackboard,
        ) -> Result<StepOutput, PipelineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.nth {
                Ok(StepOutput::unchanged().terminate("approved"))
            } else {
                Ok(StepOutput::unchanged())
            }
        }
    }

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

    /// **Scenario**: build fails with NoSteps when no step was registered.
    #[test]
    fn build_rejects_empty_loop() {
        let result = LoopBuilder::new(3).build();
        assert!(matches!(result, Err(BuildError::NoSteps)));
    }

    /// **Scenario**: build fails with DuplicateStep when two steps share an id.
    #[test]
    fn build_rejects_duplicate_ids() {
        let result = LoopBuilder::new(3)
            .step(TraceStep { id: "critic" })
            .step(TraceStep { id: "critic" })
            .build();
        assert!(matches!(result, Err(BuildError::DuplicateStep(id)) if id == "critic"));
    }

    /// **Scenario**: a zero cap runs zero passes and ends Exhausted with the board unchanged.
    #[tokio::test]
    async fn zero_cap_runs_zero_passes() {
        let looped = LoopBuilder::new(0)
            .step(TraceStep { id: "only" })
            .build()
            .expect("valid loop");
        let mut board = Blackboard::new();
        board.insert_str("seed", "value");

        let report = looped
            .run(&Task::new("t"), board.clone(), &RunContext::new())
            .await
            .expect("success");
        assert_eq!(report.iterations, 0);
        assert_eq!(report.outcome, Outcome::Exhausted);
        assert_eq!(report.blackboard, board);
    }

    /// **Scenario**: with no signal the loop runs exactly max_iterations passes, then Exhausted.
    #[tokio::test]
    async fn exhausts_after_exactly_max_passes() {
        let looped = LoopBuilder::new(3)
            .step(TraceStep { id: "a" })
            .step(TraceStep { id: "b" })
            .build()
            .expect("valid loop");

        let report = looped
            .run(&Task::new("t"), Blackboard::new(), &RunContext::new())
            .await
            .expect("success");
        assert_eq!(report.outcome, Outcome::Exhausted);
        assert_eq!(report.iterations, 3);
        let trace: Vec<String> =
            serde_json::from_value(report.blackboard.get("trace").cloned().expect("trace"))
                .expect("trace json");
        assert_eq!(trace, vec!["a", "b", "a", "b", "a", "b"]);
    }

    /// **Scenario**: a signal in pass 2 lets that pass finish in full; pass 3 never starts.
    #[tokio::test]
    async fn signal_finishes_current_pass_then_escalates() {
        let looped = LoopBuilder::new(5)
            .step(TerminateOnCall::new("critic", 2))
            .step(TraceStep { id: "reviser" })
            .build()
            .expect("valid loop");

        let report = looped
            .run(&Task::new("t"), Blackboard::new(), &RunContext::new())
            .await
            .expect("success");
        assert_eq!(report.outcome, Outcome::Escalated);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.reason.as_deref(), Some("approved"));
        let trace: Vec<String> =
            serde_json::from_value(report.blackboard.get("trace").cloned().expect("trace"))
                .expect("trace json");
        // Reviser ran in the escalating pass too.
        assert_eq!(trace, vec!["reviser", "reviser"]);
    }

    /// **Scenario**: a failure in pass 3 returns the board as of the end of pass 2.
    #[tokio::test]
    async fn failure_returns_last_committed_pass() {
        struct FailOnCall {
            nth: u32,
            calls: AtomicU32,
        }

        #[async_trait]
        impl Step for FailOnCall {
            fn id(&self) -> &str {
                "flaky"
            }

            async fn run(
                &self,
                _task: &Task,
                board: &Blackboard,
            ) -> Result<StepOutput, PipelineError> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call == self.nth {
                    return Err(PipelineError::CollaboratorUnavailable(
                        "backend down".to_string(),
                    ));
                }
                Ok(StepOutput::unchanged().write("calls", json!(call)))
            }
        }

        let looped = LoopBuilder::new(5)
            .step(FailOnCall {
                nth: 3,
                calls: AtomicU32::new(0),
            })
            .build()
            .expect("valid loop");

        let failure = looped
            .run(&Task::new("t"), Blackboard::new(), &RunContext::new())
            .await
            .expect_err("failure");
        assert_eq!(failure.iterations, 2);
        assert_eq!(failure.blackboard.get("calls"), Some(&json!(2)));
        assert!(matches!(
            failure.error,
            PipelineError::CollaboratorUnavailable(_)
        ));
    }

    /// **Scenario**: a failing first pass surfaces the error with the initial board intact.
    #[tokio::test]
    async fn failure_in_first_pass_returns_initial_board() {
        let looped = LoopBuilder::new(2)
            .step(FailingStep)
            .build()
            .expect("valid loop");
        let mut board = Blackboard::new();
        board.insert_str("seed", "value");

        let failure = looped
            .run(&Task::new("t"), board.clone(), &RunContext::new())
            .await
            .expect_err("failure");
        assert_eq!(failure.iterations, 0);
        assert_eq!(failure.blackboard, board);
    }

    /// **Scenario**: cancelling before the run starts returns Cancelled with the board unchanged.
    #[tokio::test]
    async fn cancellation_before_start() {
        let looped = LoopBuilder::new(3)
            .step(TraceStep { id: "a" })
            .build()
            .expect("valid loop");
        let ctx = RunContext::new();
        ctx.cancel.cancel();

        let report = looped
            .run(&Task::new("t"), Blackboard::new(), &ctx)
            .await
            .expect("cancellation is not a failure");
        assert_eq!(report.outcome, Outcome::Cancelled);
        assert_eq!(report.iterations, 0);
        assert!(report.blackboard.is_empty());
    }

    /// **Scenario**: cancellation while a step is pending discards that step's output;
    /// the board reflects the state before the pending step started.
    #[tokio::test]
    async fn cancellation_mid_step_discards_pending_output() {
        struct SlowStep;

        #[async_trait]
        impl Step for SlowStep {
            fn id(&self) -> &str {
                "slow"
            }

            async fn run(
                &self,
                _task: &Task,
                _board: &Blackboard,
            ) -> Result<StepOutput, PipelineError> {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(StepOutput::unchanged().write_str("slow_output", "should never land"))
            }
        }

        let looped = LoopBuilder::new(3)
            .step(TraceStep { id: "fast" })
            .step(SlowStep)
            .build()
            .expect("valid loop");
        let ctx = RunContext::new();
        let cancel = ctx.cancel.clone();

        let handle = tokio::spawn({
            let looped = looped.clone();
            let ctx = ctx.clone();
            async move { looped.run(&Task::new("t"), Blackboard::new(), &ctx).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let report = handle.await.expect("join").expect("not a failure");
        assert_eq!(report.outcome, Outcome::Cancelled);
        assert_eq!(report.iterations, 0, "no pass committed");
        assert!(!report.blackboard.contains_key("slow_output"));
        // The fast step of the interrupted pass had already committed.
        let trace: Vec<String> =
            serde_json::from_value(report.blackboard.get("trace").cloned().expect("trace"))
                .expect("trace json");
        assert_eq!(trace, vec!["fast"]);
    }

    /// **Scenario**: running a loop of no-op steps twice leaves the board identical.
    #[tokio::test]
    async fn noop_steps_are_idempotent() {
        struct NoopStep;

        #[async_trait]
        impl Step for NoopStep {
            fn id(&self) -> &str {
                "noop"
            }

            async fn run(
                &self,
                _task: &Task,
                _board: &Blackboard,
            ) -> Result<StepOutput, PipelineError> {
                Ok(StepOutput::unchanged())
            }
        }

        let looped = LoopBuilder::new(2).step(NoopStep).build().expect("valid loop");
        let mut board = Blackboard::new();
        board.insert("n", json!(1));

        let first = looped
            .run(&Task::new("t"), board.clone(), &RunContext::new())
            .await
            .expect("success");
        let second = looped
            .run(&Task::new("t"), first.blackboard.clone(), &RunContext::new())
            .await
            .expect("success");
        assert_eq!(first.blackboard, board);
        assert_eq!(second.blackboard, board);
    }

    /// **Scenario**: stream() yields step and pass events under Debug mode.
    #[tokio::test]
    async fn stream_emits_debug_events() {
        use tokio_stream::StreamExt;

        let looped = LoopBuilder::new(1)
            .step(TraceStep { id: "a" })
            .build()
            .expect("valid loop");

        let mut stream = looped.stream(Task::new("t"), Blackboard::new(), [StreamMode::Debug]);
        let mut saw_pass_start = false;
        let mut saw_step_end = false;
        while let Some(event) = stream.next().await {
            match event {
                PipelineEvent::PassStart { pass } => {
                    assert_eq!(pass, 1);
                    saw_pass_start = true;
                }
                PipelineEvent::StepEnd { step_id, result } => {
                    assert_eq!(step_id, "a");
                    assert!(result.is_ok());
                    saw_step_end = true;
                }
                _ => {}
            }
        }
        assert!(saw_pass_start);
        assert!(saw_step_end);
    }

    /// **Scenario**: the stream always ends with a terminal event carrying
    /// the run's outcome, even when the enabled modes emit nothing else.
    #[tokio::test]
    async fn stream_ends_with_terminal_event() {
        use tokio_stream::StreamExt;

        let looped = LoopBuilder::new(2)
            .step(TraceStep { id: "a" })
            .build()
            .expect("valid loop");

        let mut stream = looped.stream(Task::new("t"), Blackboard::new(), [StreamMode::Tasks]);
        let mut last = None;
        while let Some(event) = stream.next().await {
            last = Some(event);
        }
        match last {
            Some(PipelineEvent::RunEnd { outcome, reason }) => {
                assert_eq!(outcome, Outcome::Exhausted);
                assert!(reason.is_none());
            }
            other => panic!("expected RunEnd, got {other:?}"),
        }
    }

    /// **Scenario**: as a nested step, the loop consumes its own escalation and
    /// reports its net board changes upward.
    #[tokio::test]
    async fn nested_loop_consumes_escalation() {
        let looped = LoopBuilder::new(5)
            .id("inner")
            .step(TerminateOnCall::new("critic", 1))
            .step(TraceStep { id: "reviser" })
            .build()
            .expect("valid loop");

        let mut board = Blackboard::new();
        board.insert_str("untouched", "kept");
        let output = looped
            .run_with_context(&Task::new("t"), &board, &RunContext::new())
            .await
            .expect("nested run");
        assert_eq!(output.signal, Signal::Continue);
        assert!(output.updates.contains_key("trace"));
        assert!(!output.updates.contains_key("untouched"));
        assert!(output.clears.is_empty());
    }
}
