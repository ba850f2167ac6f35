//! # Anneal
//!
//! A bounded iterative refinement pipeline: plan → draft → {critique →
//! revise}*, with explicit iteration limits, shared blackboard state, and
//! structured escalation. Steps communicate only through the blackboard; the
//! runner applies each step's declared output after the step completes, so
//! failure and cancellation never leave partial mutations behind.
//!
//! ## Design principles
//!
//! - **Bounded by construction**: a [`RefineLoop`] runs at most
//!   `max_iterations` passes; the cap is a first-class parameter, never "run
//!   forever". A cap of zero means zero passes.
//! - **Structured termination**: a step ends a run early by returning
//!   [`Signal::Terminate`]. Approval is a tool call mapped to a verdict,
//!   never a magic token scanned out of artifact text.
//! - **Passes commit atomically**: the termination signal is honored at pass
//!   boundaries, a failed pass is discarded whole, and the last committed
//!   board travels with every outcome including failure.
//! - **Retry belongs to the collaborator**: the loop controller never
//!   retries; [`ChatOpenAI`] retries transient backend failures per its
//!   [`RetryPolicy`].
//!
//! ## Main modules
//!
//! - [`pipeline`]: [`Step`], [`StepOutput`], [`Signal`], [`RefineLoop`],
//!   [`Pipeline`], [`RunContext`], run reports and errors.
//! - [`state`]: the [`Blackboard`].
//! - [`agent`]: collaborator steps ([`LlmStep`], [`CriticStep`],
//!   [`ReviserStep`]), the [`Critic`] trait, and [`RefineryBuilder`].
//! - [`llm`]: [`LlmClient`] trait, [`MockLlm`], [`ChatOpenAI`],
//!   [`RetryPolicy`].
//! - [`stream`]: [`PipelineEvent`], [`StreamMode`] for streaming runs.
//! - [`message`]: [`Message`] (System / User / Assistant).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use anneal::{
//!     Blackboard, CriticStep, LoopBuilder, ReviserStep, RunContext, ScriptedCritic, Task,
//!     Verdict,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let critic = Arc::new(ScriptedCritic::new([
//!     Verdict::Revise("tighten the ending".to_string()),
//!     Verdict::Approved,
//! ]));
//! let looped = LoopBuilder::new(3)
//!     .step(CriticStep::new("critic", critic, "current_story", "critique"))
//!     .build()?;
//!
//! let mut board = Blackboard::new();
//! board.insert_str("current_story", "a first draft");
//!
//! let report = looped
//!     .run(&Task::new("a short story"), board, &RunContext::new())
//!     .await?;
//! println!("{:?} after {} pass(es)", report.outcome, report.iterations);
//! # Ok(())
//! # }
//! ```
//!
//! Run the story example: `cargo run -p anneal-examples --example story_mock`.

pub mod agent;
pub mod error;
pub mod llm;
pub mod message;
pub mod pipeline;
pub mod state;
pub mod stream;
pub mod task;

pub use agent::{
    Critic, CriticStep, LlmCritic, LlmStep, RefineConfig, RefineryBuilder, ReviserStep,
    ScriptedCritic, Verdict, CRITIQUE_KEY, PLAN_KEY, RAG_ANSWER_KEY, STORY_KEY,
};
pub use error::PipelineError;
pub use llm::{
    ChatOpenAI, LlmClient, LlmResponse, LlmUsage, MockLlm, MockResponse, RetryPolicy, ToolCall,
    ToolChoiceMode, ToolSpec,
};
pub use message::Message;
pub use pipeline::{
    BuildError, LoopBuilder, LoopFailure, LoopReport, Outcome, Pipeline, PipelineBuilder,
    RefineLoop, RunContext, Signal, Step, StepOutput,
};
pub use state::Blackboard;
pub use stream::{EventWriter, PipelineEvent, StreamMode};
pub use task::Task;
