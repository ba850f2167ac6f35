//! Termination signal returned by a step: continue the run, or end it early.
//!
//! The runners use this to decide whether the current pass is the last one.

/// Step-declared control signal.
///
/// - **Continue**: the run proceeds normally.
/// - **Terminate(reason)**: request early termination. The refinement loop
///   finishes the current pass in full, then stops with outcome `Escalated`;
///   a sequence stops before its next step. Once observed, the signal is
///   permanent for the run.
///
/// Termination is always this explicit structured value. Runners never infer
/// approval by inspecting artifact text on the blackboard.
///
/// **Interaction**: Carried in `StepOutput`; consumed by `RefineLoop::run`
/// and `Pipeline::run`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Signal {
    /// Proceed with the declared step order and iteration bound.
    Continue,
    /// End the run early, with a short human-readable reason (e.g. "approved").
    Terminate(String),
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Continue
    }
}

impl Signal {
    /// Whether this signal requests termination.
    pub fn is_terminate(&self) -> bool {
        matches!(self, Signal::Terminate(_))
    }
}
