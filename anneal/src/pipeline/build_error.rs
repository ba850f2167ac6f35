//! Builder validation errors.

use thiserror::Error;

/// Error raised when a loop or pipeline configuration is invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// No steps were registered.
    #[error("at least one step is required")]
    NoSteps,

    /// Two steps share an id.
    #[error("duplicate step id: {0}")]
    DuplicateStep(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: BuildError Display names the offending step id.
    #[test]
    fn build_error_display() {
        assert_eq!(BuildError::NoSteps.to_string(), "at least one step is required");
        assert_eq!(
            BuildError::DuplicateStep("critic".to_string()).to_string(),
            "duplicate step id: critic"
        );
    }
}
