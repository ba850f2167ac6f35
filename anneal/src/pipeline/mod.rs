//! Pipeline execution: the step contract, the bounded refinement loop, and
//! sequential composition.
//!
//! Build a [`RefineLoop`] with [`LoopBuilder`] or a [`Pipeline`] with
//! [`PipelineBuilder`]; both run steps over a shared [`Blackboard`] and both
//! implement [`Step`], so they compose.
//!
//! [`Blackboard`]: crate::state::Blackboard

mod build_error;
pub mod logging;
mod refine_loop;
mod report;
mod run_context;
mod sequence;
mod signal;
mod step;

pub use build_error::BuildError;
pub use refine_loop::{LoopBuilder, RefineLoop};
pub use report::{LoopFailure, LoopReport, Outcome};
pub use run_context::RunContext;
pub use sequence::{Pipeline, PipelineBuilder};
pub use signal::Signal;
pub use step::{Step, StepOutput};
