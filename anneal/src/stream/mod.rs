//! Streaming types for pipeline runs.
//!
//! Defines stream modes, events, and the `EventWriter` used by the runners to
//! emit incremental results. Consumed via `RefineLoop::stream` and
//! `Pipeline::stream`.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::pipeline::Outcome;
use crate::state::Blackboard;

/// Stream mode selector: which kinds of events to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Emit a full blackboard snapshot after each step completes.
    Values,
    /// Emit incremental updates with step id and blackboard after that step.
    Updates,
    /// Emit step start/end events for each step invocation.
    Tasks,
    /// Emit everything (tasks plus pass boundaries).
    Debug,
}

/// Streamed event emitted while running a pipeline.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// Full blackboard snapshot after a step finishes.
    Values(Blackboard),
    /// Incremental update with the step id and blackboard after that step.
    Updates {
        step_id: String,
        blackboard: Blackboard,
    },
    /// A step began executing.
    StepStart { step_id: String },
    /// A step finished executing. `result` is Err(message) on failure.
    StepEnd {
        step_id: String,
        result: Result<(), String>,
    },
    /// A refinement pass began (1-based pass number).
    PassStart { pass: u32 },
    /// A refinement pass completed in full.
    PassEnd { pass: u32 },
    /// The run finished. Emitted unconditionally as the final event of
    /// `stream()`, regardless of the enabled modes.
    RunEnd {
        outcome: Outcome,
        reason: Option<String>,
    },
    /// The run failed. Emitted unconditionally as the final event of
    /// `stream()`, regardless of the enabled modes.
    RunFailed { message: String },
}

/// A writer for emitting streaming events from the runners.
///
/// Encapsulates the stream sender and mode checking so the execution loops
/// do not check `stream_mode` by hand. A writer with no sender is a no-op.
#[derive(Clone)]
pub struct EventWriter {
    tx: Option<mpsc::Sender<PipelineEvent>>,
    modes: Arc<HashSet<StreamMode>>,
}

impl EventWriter {
    /// Creates a writer with the given sender and enabled modes.
    pub fn new(tx: Option<mpsc::Sender<PipelineEvent>>, modes: HashSet<StreamMode>) -> Self {
        Self {
            tx,
            modes: Arc::new(modes),
        }
    }

    /// A writer that emits nothing.
    pub fn noop() -> Self {
        Self {
            tx: None,
            modes: Arc::new(HashSet::new()),
        }
    }

    /// Whether `mode` is enabled.
    pub fn is_mode_enabled(&self, mode: StreamMode) -> bool {
        self.modes.contains(&mode)
    }

    /// Emits a full blackboard snapshot. Sends only when `Values` is enabled.
    pub async fn emit_values(&self, blackboard: Blackboard) -> bool {
        if !self.modes.contains(&StreamMode::Values) {
            return false;
        }
        if let Some(tx) = &self.tx {
            tx.send(PipelineEvent::Values(blackboard)).await.is_ok()
        } else {
            false
        }
    }

    /// Emits an incremental update. Sends only when `Updates` is enabled.
    pub async fn emit_updates(&self, step_id: impl Into<String>, blackboard: Blackboard) -> bool {
        if !self.modes.contains(&StreamMode::Updates) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = PipelineEvent::Updates {
                step_id: step_id.into(),
                blackboard,
            };
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a step start event. Sends when `Tasks` or `Debug` is enabled.
    pub async fn emit_step_start(&self, step_id: impl Into<String>) -> bool {
        if !self.modes.contains(&StreamMode::Tasks) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = PipelineEvent::StepStart {
                step_id: step_id.into(),
            };
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a step end event. Sends when `Tasks` or `Debug` is enabled.
    pub async fn emit_step_end(
        &self,
        step_id: impl Into<String>,
        result: Result<(), String>,
    ) -> bool {
        if !self.modes.contains(&StreamMode::Tasks) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = PipelineEvent::StepEnd {
                step_id: step_id.into(),
                result,
            };
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a pass start event. Sends only when `Debug` is enabled.
    pub async fn emit_pass_start(&self, pass: u32) -> bool {
        if !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        if let Some(tx) = &self.tx {
            tx.send(PipelineEvent::PassStart { pass }).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a pass end event. Sends only when `Debug` is enabled.
    pub async fn emit_pass_end(&self, pass: u32) -> bool {
        if !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        if let Some(tx) = &self.tx {
            tx.send(PipelineEvent::PassEnd { pass }).await.is_ok()
        } else {
            false
        }
    }
}

impl std::fmt::Debug for EventWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWriter")
            .field("has_sender", &self.tx.is_some())
            .field("modes", &self.modes)
            .finish()
    }
}
