//! # ImprovementAction — remediation work orders and their outcomes
//!
//! ## Responsibility
//! Define the action type set, priority ordering, the pending →
//! in-progress → terminal status machine, and the LearningExperience
//! recorded once per applied action.

use crate::artifact::unix_now;
use crate::evaluation::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The fixed set of remediation action types. Each kind maps 1:1 to a
/// registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Change the code-generation strategy (low readability).
    GenerationStrategy,
    /// Optimize the algorithm (high execution time).
    AlgorithmOptimization,
    /// Refactor the architecture (low maintainability).
    ArchitectureRefactoring,
    /// Enhance the training data (failed tests).
    TrainingDataEnhancement,
    /// Tune model parameters (large overall gap).
    ParameterTuning,
    /// Integrate critical evaluator feedback.
    FeedbackIntegration,
}

impl ActionKind {
    /// Canonical snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerationStrategy => "generation_strategy",
            Self::AlgorithmOptimization => "algorithm_optimization",
            Self::ArchitectureRefactoring => "architecture_refactoring",
            Self::TrainingDataEnhancement => "training_data_enhancement",
            Self::ParameterTuning => "parameter_tuning",
            Self::FeedbackIntegration => "feedback_integration",
        }
    }

    /// All action kinds.
    pub fn all() -> &'static [ActionKind] {
        &[
            Self::GenerationStrategy,
            Self::AlgorithmOptimization,
            Self::ArchitectureRefactoring,
            Self::TrainingDataEnhancement,
            Self::ParameterTuning,
            Self::FeedbackIntegration,
        ]
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Urgency of an action. Ordered ascending so `Critical > High > Medium >
/// Low` holds for sorting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    /// Routine improvement.
    Low,
    /// Noticeable degradation.
    Medium,
    /// Significant degradation.
    High,
    /// Immediate attention required.
    Critical,
}

/// Lifecycle status of an action.
///
/// Transitions: `Pending` → `InProgress` → `Completed` | `Failed`.
/// Terminal states never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Generated but not yet applied.
    Pending,
    /// Currently being applied.
    InProgress,
    /// Applied and the overall score improved.
    Completed,
    /// Application failed or the score did not improve.
    Failed,
}

impl ActionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A proposed remediation derived from a measured performance gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementAction {
    /// Unique action identifier (UUID).
    pub id: String,
    /// The kind, which selects the handler.
    pub kind: ActionKind,
    /// Human-readable description of the remediation.
    pub description: String,
    /// Handler parameters.
    pub parameters: HashMap<String, String>,
    /// What the remediation is expected to achieve.
    pub expected_outcome: String,
    /// Urgency.
    pub priority: ActionPriority,
    /// Lifecycle status.
    pub status: ActionStatus,
    /// Unix timestamp (seconds) when the action was generated.
    pub created_at: u64,
    /// Unix timestamp (seconds) when the action reached a terminal state.
    pub applied_at: Option<u64>,
}

impl ImprovementAction {
    /// Create a pending action.
    pub fn new(
        kind: ActionKind,
        description: impl Into<String>,
        priority: ActionPriority,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            description: description.into(),
            parameters: HashMap::new(),
            expected_outcome: String::new(),
            priority,
            status: ActionStatus::Pending,
            created_at: unix_now(),
            applied_at: None,
        }
    }

    /// Add a handler parameter (builder style).
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Set the expected outcome (builder style).
    pub fn with_expected_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.expected_outcome = outcome.into();
        self
    }
}

/// The recorded outcome of applying one action: before/after metrics and
/// the derived improvement ratio. Created exactly once per applied action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningExperience {
    /// Task the originating evaluation belonged to.
    pub task_id: String,
    /// The applied action.
    pub action_id: String,
    /// Metrics snapshot before remediation.
    pub before: PerformanceMetrics,
    /// Metrics snapshot after remediation.
    pub after: PerformanceMetrics,
    /// Whether the overall score improved.
    pub success: bool,
    /// `(after.overall − before.overall) / before.overall`, or 0.0 when
    /// the before score is 0.
    pub improvement_ratio: f64,
}

impl LearningExperience {
    /// Build an experience from before/after snapshots.
    pub fn from_snapshots(
        task_id: impl Into<String>,
        action_id: impl Into<String>,
        before: PerformanceMetrics,
        after: PerformanceMetrics,
    ) -> Self {
        let before_overall = before.overall_score();
        let after_overall = after.overall_score();
        let improvement_ratio = if before_overall == 0.0 {
            0.0
        } else {
            (after_overall - before_overall) / before_overall
        };
        Self {
            task_id: task_id.into(),
            action_id: action_id.into(),
            before,
            after,
            success: after_overall > before_overall,
            improvement_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(score: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            complexity_score: score,
            readability_score: score,
            maintainability_score: score,
            test_coverage: score,
            benchmark_score: score,
            ..PerformanceMetrics::default()
        }
    }

    #[test]
    fn test_action_kind_as_str() {
        assert_eq!(ActionKind::GenerationStrategy.as_str(), "generation_strategy");
        assert_eq!(ActionKind::FeedbackIntegration.as_str(), "feedback_integration");
    }

    #[test]
    fn test_action_kind_all_covers_six() {
        assert_eq!(ActionKind::all().len(), 6);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(ActionPriority::Critical > ActionPriority::High);
        assert!(ActionPriority::High > ActionPriority::Medium);
        assert!(ActionPriority::Medium > ActionPriority::Low);
    }

    #[test]
    fn test_status_terminal_variants() {
        assert!(ActionStatus::Completed.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
        assert!(!ActionStatus::Pending.is_terminal());
        assert!(!ActionStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_action_new_is_pending() {
        let action = ImprovementAction::new(
            ActionKind::ParameterTuning,
            "tune",
            ActionPriority::Critical,
        );
        assert_eq!(action.status, ActionStatus::Pending);
        assert!(action.applied_at.is_none());
        assert!(!action.id.is_empty());
    }

    #[test]
    fn test_action_builder_methods() {
        let action = ImprovementAction::new(
            ActionKind::GenerationStrategy,
            "switch strategy",
            ActionPriority::High,
        )
        .with_parameter("current_readability", "0.3")
        .with_expected_outcome("readability above 0.7");
        assert_eq!(
            action.parameters.get("current_readability").map(String::as_str),
            Some("0.3")
        );
        assert!(action.expected_outcome.contains("0.7"));
    }

    #[test]
    fn test_experience_success_on_improvement() {
        let exp = LearningExperience::from_snapshots("t", "a", metrics(0.5), metrics(0.6));
        assert!(exp.success);
        assert!((exp.improvement_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_experience_failure_on_regression() {
        let exp = LearningExperience::from_snapshots("t", "a", metrics(0.6), metrics(0.5));
        assert!(!exp.success);
        assert!(exp.improvement_ratio < 0.0);
    }

    #[test]
    fn test_experience_zero_baseline_ratio_is_zero() {
        let exp = LearningExperience::from_snapshots("t", "a", metrics(0.0), metrics(0.5));
        assert!((exp.improvement_ratio - 0.0).abs() < f64::EPSILON);
        assert!(exp.success);
    }

    #[test]
    fn test_experience_equal_scores_not_success() {
        let exp = LearningExperience::from_snapshots("t", "a", metrics(0.5), metrics(0.5));
        assert!(!exp.success);
    }

    #[test]
    fn test_action_serde_roundtrip() {
        let action = ImprovementAction::new(
            ActionKind::ArchitectureRefactoring,
            "refactor",
            ActionPriority::Medium,
        );
        let json = serde_json::to_string(&action).unwrap();
        let back: ImprovementAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, action.id);
        assert_eq!(back.kind, ActionKind::ArchitectureRefactoring);
        assert_eq!(back.status, ActionStatus::Pending);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ActionStatus::Pending.to_string(), "pending");
        assert_eq!(ActionStatus::InProgress.to_string(), "in_progress");
        assert_eq!(ActionStatus::Completed.to_string(), "completed");
        assert_eq!(ActionStatus::Failed.to_string(), "failed");
    }
}
