//! Shared state for pipeline runs.
//!
//! One [`Blackboard`] per run: created empty, mutated by the runner applying
//! step outputs, discarded (or read out by the caller) at run end.

mod blackboard;

pub use blackboard::Blackboard;
