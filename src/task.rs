//! # Task — unit of requested work
//!
//! ## Responsibility
//! Define the Task struct, Difficulty, and TaskStatus lifecycle for the
//! orchestration engine. Tasks are immutable after submission; their status
//! record is mutated by the task store until terminal.
//!
//! ## Guarantees
//! - Serializable: round-trips through serde (JSON/TOML ↔ Rust)
//! - Monotonic: terminal statuses never revert (enforced by the store)
//! - Non-panicking: all operations return plain values
//!
//! ## NOT Responsible For
//! - Queueing and status mutation (see: store.rs)
//! - Agent dispatch (see: agent module, center.rs)

use crate::artifact::{unix_now, Language};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Estimated difficulty of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Small, well-understood change.
    Easy,
    /// A typical single-file task.
    Medium,
    /// Multi-step task with edge cases.
    Hard,
    /// Open-ended or architecture-level task.
    Expert,
}

impl Difficulty {
    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a task in its lifecycle.
///
/// Tasks progress: `Pending` → `InProgress` → `Completed` | `Failed`.
/// `Cancelled` may be entered from `Pending` or `InProgress`; `NotFound`
/// is only ever returned for lookups of unknown ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, waiting for the dispatch loop.
    Pending,
    /// Claimed by the dispatch loop and being processed.
    InProgress,
    /// Finished with an artifact.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion (advisory for in-flight work).
    Cancelled,
    /// The queried task id is unknown.
    NotFound,
}

impl TaskStatus {
    /// Returns `true` if the status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if the task may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

/// A unit of requested work, immutable after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID).
    pub id: String,
    /// Short human-readable title.
    pub title: String,
    /// Full problem description fed to the agent.
    pub description: String,
    /// Target language for the produced artifact.
    pub language: Language,
    /// Estimated difficulty.
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    /// Functional requirements the artifact must address.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Constraints on the solution (style, dependencies, limits).
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Free-form tags for filtering and reporting.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unix timestamp (seconds) when the task was created.
    pub created_at: u64,
}

impl Task {
    /// Create a new task with a fresh UUID and medium difficulty.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        language: Language,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            language,
            difficulty: Difficulty::Medium,
            requirements: Vec::new(),
            constraints: Vec::new(),
            tags: Vec::new(),
            created_at: unix_now(),
        }
    }

    /// Set the difficulty (builder style).
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set the requirements list (builder style).
    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    /// Set the constraints list (builder style).
    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Set the tags list (builder style).
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Default difficulty for deserialization.
fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
        assert_eq!(TaskStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(TaskStatus::NotFound.to_string(), "not_found");
    }

    #[test]
    fn test_task_status_terminal_variants() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::NotFound.is_terminal());
    }

    #[test]
    fn test_task_status_cancellable_variants() {
        assert!(TaskStatus::Pending.is_cancellable());
        assert!(TaskStatus::InProgress.is_cancellable());
        assert!(!TaskStatus::Completed.is_cancellable());
        assert!(!TaskStatus::Failed.is_cancellable());
        assert!(!TaskStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn test_task_new_defaults() {
        let task = Task::new("sort", "implement quicksort", Language::Python);
        assert!(!task.id.is_empty());
        assert_eq!(task.title, "sort");
        assert_eq!(task.difficulty, Difficulty::Medium);
        assert!(task.requirements.is_empty());
        assert!(task.constraints.is_empty());
        assert!(task.tags.is_empty());
        assert!(task.created_at > 0);
    }

    #[test]
    fn test_task_builder_methods() {
        let task = Task::new("t", "d", Language::Rust)
            .with_difficulty(Difficulty::Hard)
            .with_requirements(vec!["parse input".to_string()])
            .with_constraints(vec!["no unsafe".to_string()])
            .with_tags(vec!["parser".to_string()]);
        assert_eq!(task.difficulty, Difficulty::Hard);
        assert_eq!(task.requirements.len(), 1);
        assert_eq!(task.constraints.len(), 1);
        assert_eq!(task.tags.len(), 1);
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::new("a", "d", Language::Shell);
        let b = Task::new("b", "d", Language::Shell);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_task_serde_roundtrip() {
        let task = Task::new("fib", "fibonacci", Language::JavaScript)
            .with_requirements(vec!["iterative".to_string()]);
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.language, Language::JavaScript);
        assert_eq!(back.requirements, task.requirements);
    }

    #[test]
    fn test_task_deserialize_defaults_applied() {
        let json = r#"{
            "id": "t-1",
            "title": "minimal",
            "description": "minimal task",
            "language": "python",
            "created_at": 1700000000
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.difficulty, Difficulty::Medium);
        assert!(task.requirements.is_empty());
    }

    #[test]
    fn test_difficulty_ordering() {
        assert!(Difficulty::Expert > Difficulty::Hard);
        assert!(Difficulty::Hard > Difficulty::Medium);
        assert!(Difficulty::Medium > Difficulty::Easy);
    }

    #[test]
    fn test_difficulty_as_str() {
        assert_eq!(Difficulty::Easy.as_str(), "easy");
        assert_eq!(Difficulty::Expert.as_str(), "expert");
    }

    #[test]
    fn test_task_status_serde_roundtrip_all_variants() {
        let statuses = [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
            TaskStatus::NotFound,
        ];
        for status in statuses {
            let json = serde_json::to_string(&status).unwrap();
            let back: TaskStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }
}
