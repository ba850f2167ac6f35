//! Collaborator-backed steps and pipeline assembly.
//!
//! [`LlmStep`] covers the single-shot shapes (planner, writer, retrieval);
//! [`CriticStep`] and [`ReviserStep`] form the body of a refinement loop;
//! [`RefineryBuilder`] wires them into the built-in pipelines from a
//! [`RefineConfig`].

mod builder;
mod critic;
mod generate;
pub mod prompts;
mod revise;

pub use builder::{RefineConfig, RefineryBuilder};
pub use critic::{Critic, CriticStep, LlmCritic, ScriptedCritic, Verdict};
pub use generate::LlmStep;
pub use revise::ReviserStep;

/// Blackboard key for the story outline.
pub const PLAN_KEY: &str = "plan";
/// Blackboard key for the story artifact.
pub const STORY_KEY: &str = "current_story";
/// Blackboard key for critic feedback.
pub const CRITIQUE_KEY: &str = "critique";
/// Blackboard key for the retrieval answer artifact.
pub const RAG_ANSWER_KEY: &str = "rag_answer";
