//! Task identity and scope.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a task. Used as the primary key of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh identifier of the form `task-<12 hex chars>`.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        TaskId(format!("task-{}", &raw[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// A unit of requested change flowing through the pipeline.
///
/// Created once at run start and never mutated afterwards; the builder
/// methods consume `self`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Free-text description of the change.
    pub description: String,

    /// Target files, in the order given. Empty means whole-project scope.
    pub targets: Vec<PathBuf>,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            description: description.into(),
            targets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Override the generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = TaskId(id.into());
        self
    }

    /// Set the target files. Duplicates are dropped, first occurrence wins.
    pub fn with_targets<I, P>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut ordered: Vec<PathBuf> = Vec::new();
        for t in targets {
            let t = t.into();
            if !ordered.contains(&t) {
                ordered.push(t);
            }
        }
        self.targets = ordered;
        self
    }

    pub fn is_whole_project(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("task-"));
        assert_eq!(a.as_str().len(), "task-".len() + 12);
    }

    #[test]
    fn test_targets_keep_order_and_drop_duplicates() {
        let task = Task::new("tidy imports").with_targets(["b.rs", "a.rs", "b.rs"]);
        assert_eq!(task.targets, vec![PathBuf::from("b.rs"), PathBuf::from("a.rs")]);
        assert!(!task.is_whole_project());
    }

    #[test]
    fn test_empty_targets_mean_whole_project() {
        let task = Task::new("bump deps").with_id("t-1");
        assert!(task.is_whole_project());
        assert_eq!(task.id.to_string(), "t-1");
    }
}
