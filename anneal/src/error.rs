//! Pipeline execution error types.
//!
//! Used by `Step::run` and by the loop/sequence runners. Exhausting the
//! iteration bound and caller-initiated cancellation are *not* errors; they
//! are regular `Outcome`s in the run report.

use thiserror::Error;

/// Error raised by a step or a collaborator during a pipeline run.
///
/// Every non-success path surfaces one of these variants; nothing is
/// swallowed. The loop runner wraps the error in `LoopFailure` together with
/// the last committed blackboard so callers can inspect partial progress.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The generation/tool backend could not be reached (network error,
    /// service down). The run aborts in the FAILED state.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// A step produced output violating the blackboard key contract
    /// (missing expected key, wrong type, empty response where content was
    /// required). A configuration/integration error; never silently coerced.
    #[error("malformed output from step `{step}`: {detail}")]
    MalformedOutput { step: String, detail: String },

    /// Execution failed with a message (e.g. request could not be built).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl PipelineError {
    /// Shorthand for `MalformedOutput` with owned strings.
    pub fn malformed(step: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedOutput {
            step: step.into(),
            detail: detail.into(),
        }
    }
}
