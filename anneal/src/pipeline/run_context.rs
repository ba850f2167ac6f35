//! Run context passed into steps for streaming- and cancellation-aware runs.
//!
//! Holds the run id, the cancellation token, the optional stream sender, and
//! the selected stream modes. The runners build one per run; nested runners
//! (a loop inside a sequence) receive the outer context so cancellation and
//! streaming propagate.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::stream::{EventWriter, PipelineEvent, StreamMode};

/// Per-run execution context.
///
/// Cheap to clone. Cancelling the token stops the run between steps; a step
/// already in flight is dropped mid-execution and its output is discarded.
#[derive(Clone, Debug)]
pub struct RunContext {
    /// Unique id for this run, included in log events.
    pub run_id: Uuid,
    /// Cooperative cancellation for the whole run.
    pub cancel: CancellationToken,
    /// Optional sender for streaming events.
    pub stream_tx: Option<mpsc::Sender<PipelineEvent>>,
    /// Enabled stream modes.
    pub stream_mode: HashSet<StreamMode>,
}

impl RunContext {
    /// Creates a context with a fresh run id, a fresh token, and no streaming.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            stream_tx: None,
            stream_mode: HashSet::new(),
        }
    }

    /// Sets the cancellation token (builder).
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the stream sender and modes (builder).
    pub fn with_stream(
        mut self,
        tx: mpsc::Sender<PipelineEvent>,
        modes: HashSet<StreamMode>,
    ) -> Self {
        self.stream_tx = Some(tx);
        self.stream_mode = modes;
        self
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// An event writer bound to this context's sender and modes.
    pub fn event_writer(&self) -> EventWriter {
        EventWriter::new(self.stream_tx.clone(), self.stream_mode.clone())
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
