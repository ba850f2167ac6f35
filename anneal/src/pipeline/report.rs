//! Run outcomes: the report returned on success and the failure type.
//!
//! Every run ends in exactly one terminal outcome. Escalation, exhaustion,
//! and cancellation are successes carrying the final blackboard; a step error
//! is the only failure, and it still carries the last committed blackboard.

use crate::error::PipelineError;
use crate::state::Blackboard;

/// Terminal outcome of a refinement loop or pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A step signalled termination; the pass that produced it completed in full.
    Escalated,
    /// The iteration cap was reached without a termination signal.
    Exhausted,
    /// The run was cancelled between steps; no failure occurred.
    Cancelled,
}

/// Successful run result: final blackboard plus how the run ended.
#[derive(Debug, Clone)]
pub struct LoopReport {
    /// The blackboard at run end.
    pub blackboard: Blackboard,
    /// Number of fully completed passes (a pipeline counts as one pass).
    pub iterations: u32,
    /// How the run ended.
    pub outcome: Outcome,
    /// Termination reason, present when `outcome == Escalated`.
    pub reason: Option<String>,
}

/// A step error, with the last committed blackboard attached.
///
/// For a loop this is the board as of the end of the last fully completed
/// pass: updates from the failed pass's earlier steps are discarded. For a
/// pipeline it is the board as of the last completed step.
#[derive(Debug)]
pub struct LoopFailure {
    /// The step error that ended the run.
    pub error: PipelineError,
    /// The blackboard at the last committed state before the failure.
    pub blackboard: Blackboard,
    /// Number of fully completed passes before the failure.
    pub iterations: u32,
}

impl std::fmt::Display for LoopFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run failed after {} completed iteration(s): {}",
            self.iterations, self.error
        )
    }
}

impl std::error::Error for LoopFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
