//! Blackboard: the shared key → value state threaded through a pipeline run.
//!
//! Keys are stable identifiers agreed between producer and consumer steps
//! ahead of time (e.g. `current_story`, `critique`). A later step may
//! overwrite a key written earlier; the refinement loop overwrites the
//! artifact key on every iteration. One blackboard per run; access within a
//! run is strictly sequential, so no locking is needed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shared mutable state for one pipeline run.
///
/// An ordered map from key to JSON value. Steps never mutate it directly:
/// they return updates and clears in a `StepOutput`, and the runner applies
/// them after the step completes. Keys a step does not name are preserved
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blackboard {
    entries: BTreeMap<String, Value>,
}

impl Blackboard {
    /// Creates an empty blackboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value under `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns the string value under `key`; `None` if absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    /// Inserts or overwrites a value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Inserts or overwrites a string value.
    pub fn insert_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<Value> {
        self.entries.insert(key.into(), Value::String(value.into()))
    }

    /// Removes a key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over (key, value) pairs in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the blackboard holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies a step's declared writes and clears. Writes win over clears
    /// when the same key appears in both.
    pub(crate) fn apply(&mut self, updates: &BTreeMap<String, Value>, clears: &[String]) {
        for key in clears {
            self.entries.remove(key);
        }
        for (key, value) in updates {
            self.entries.insert(key.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, Value)> for Blackboard {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
