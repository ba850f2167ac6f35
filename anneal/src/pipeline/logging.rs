//! Logging utilities for pipeline execution.
//!
//! Structured logging for run lifecycle, pass boundaries, and step execution.

use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::Outcome;

/// Log run start.
pub fn log_run_start(run_id: &Uuid, max_iterations: u32) {
    tracing::info!(%run_id, max_iterations, "Starting run");
}

/// Log run completion with its terminal outcome.
pub fn log_run_complete(run_id: &Uuid, outcome: Outcome, iterations: u32) {
    tracing::info!(%run_id, ?outcome, iterations, "Run complete");
}

/// Log run failure.
pub fn log_run_error(run_id: &Uuid, error: &PipelineError) {
    tracing::error!(%run_id, %error, "Run failed");
}

/// Log the start of a refinement pass (1-based).
pub fn log_pass_start(run_id: &Uuid, pass: u32) {
    tracing::debug!(%run_id, pass, "Starting pass");
}

/// Log a fully committed refinement pass.
pub fn log_pass_complete(run_id: &Uuid, pass: u32) {
    tracing::debug!(%run_id, pass, "Pass committed");
}

/// Log step execution start.
pub fn log_step_start(run_id: &Uuid, step_id: &str) {
    tracing::debug!(%run_id, step_id, "Starting step");
}

/// Log step execution completion.
pub fn log_step_complete(run_id: &Uuid, step_id: &str, terminated: bool) {
    tracing::debug!(%run_id, step_id, terminated, "Step complete");
}

/// Log a cancellation observed between or during steps.
pub fn log_cancelled(run_id: &Uuid, step_id: Option<&str>) {
    tracing::info!(%run_id, step_id, "Run cancelled");
}
