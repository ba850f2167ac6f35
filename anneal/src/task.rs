//! The task: the original user request, immutable for one pipeline run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The user request driving one pipeline run.
///
/// A natural-language description plus optional structured parameters.
/// Steps receive the task read-only; only the blackboard evolves during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Natural-language request (e.g. "a short story about a lighthouse keeper").
    pub description: String,
    /// Optional structured parameters supplied by the calling application.
    pub params: Option<Value>,
}

impl Task {
    /// Creates a task from a description, with no parameters.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            params: None,
        }
    }

    /// Sets structured parameters (builder).
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}
