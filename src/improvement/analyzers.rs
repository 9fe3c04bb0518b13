//! # Analyzers — stateless shortfall-to-action mappers
//!
//! Each analyzer is a pure function of `(evaluation, gap)` that emits zero
//! or one [`ImprovementAction`]. The engine runs every registered analyzer
//! independently and sorts the emitted actions by priority descending.

use crate::evaluation::{EvaluationResult, FeedbackSeverity};
use crate::improvement::action::{ActionKind, ActionPriority, ImprovementAction};

/// A stateless analyzer: pure function of `(evaluation, gap)`.
pub type Analyzer = fn(&EvaluationResult, f64) -> Option<ImprovementAction>;

/// Readability floor below which a generation-strategy change is proposed.
const READABILITY_FLOOR: f64 = 0.5;

/// Execution-time ceiling (ms) above which algorithm optimization is proposed.
const EXECUTION_TIME_CEILING_MS: f64 = 1000.0;

/// Maintainability floor below which an architecture refactor is proposed.
const MAINTAINABILITY_FLOOR: f64 = 0.5;

/// Gap above which parameter tuning is proposed.
const LARGE_GAP: f64 = 0.3;

/// Low readability → change the code-generation strategy.
pub fn readability_analyzer(
    evaluation: &EvaluationResult,
    _gap: f64,
) -> Option<ImprovementAction> {
    let readability = evaluation.metrics.readability_score;
    if readability >= READABILITY_FLOOR {
        return None;
    }
    Some(
        ImprovementAction::new(
            ActionKind::GenerationStrategy,
            format!("readability {readability:.2} is below {READABILITY_FLOOR}; switch generation strategy"),
            ActionPriority::High,
        )
        .with_parameter("current_readability", format!("{readability:.4}"))
        .with_expected_outcome("readability at or above the configured minimum"),
    )
}

/// High execution time → optimize the algorithm.
pub fn execution_time_analyzer(
    evaluation: &EvaluationResult,
    _gap: f64,
) -> Option<ImprovementAction> {
    let elapsed = evaluation.metrics.execution_time_ms;
    if elapsed <= EXECUTION_TIME_CEILING_MS {
        return None;
    }
    Some(
        ImprovementAction::new(
            ActionKind::AlgorithmOptimization,
            format!("execution time {elapsed:.0}ms exceeds {EXECUTION_TIME_CEILING_MS:.0}ms; optimize the algorithm"),
            ActionPriority::High,
        )
        .with_parameter("execution_time_ms", format!("{elapsed:.0}"))
        .with_expected_outcome("execution time under the ceiling"),
    )
}

/// Low maintainability → refactor the architecture.
pub fn maintainability_analyzer(
    evaluation: &EvaluationResult,
    _gap: f64,
) -> Option<ImprovementAction> {
    let maintainability = evaluation.metrics.maintainability_score;
    if maintainability >= MAINTAINABILITY_FLOOR {
        return None;
    }
    Some(
        ImprovementAction::new(
            ActionKind::ArchitectureRefactoring,
            format!("maintainability {maintainability:.2} is below {MAINTAINABILITY_FLOOR}; refactor structure"),
            ActionPriority::Medium,
        )
        .with_parameter("current_maintainability", format!("{maintainability:.4}"))
        .with_expected_outcome("maintainability at or above the configured minimum"),
    )
}

/// Failed tests → enhance the training data.
pub fn failed_tests_analyzer(
    evaluation: &EvaluationResult,
    _gap: f64,
) -> Option<ImprovementAction> {
    if evaluation.passed_tests {
        return None;
    }
    Some(
        ImprovementAction::new(
            ActionKind::TrainingDataEnhancement,
            "evaluation failed; enhance training data with this task shape",
            ActionPriority::High,
        )
        .with_parameter("task_id", evaluation.task_id.clone())
        .with_expected_outcome("tasks of this shape pass evaluation"),
    )
}

/// Large overall gap → tune model parameters.
pub fn gap_analyzer(evaluation: &EvaluationResult, gap: f64) -> Option<ImprovementAction> {
    if gap <= LARGE_GAP {
        return None;
    }
    Some(
        ImprovementAction::new(
            ActionKind::ParameterTuning,
            format!("performance gap {gap:.2} exceeds {LARGE_GAP}; tune generation parameters"),
            ActionPriority::Critical,
        )
        .with_parameter("gap", format!("{gap:.4}"))
        .with_parameter("task_id", evaluation.task_id.clone())
        .with_expected_outcome("overall score gap under the threshold"),
    )
}

/// Critical or high-severity feedback present → integrate the feedback.
pub fn feedback_analyzer(
    evaluation: &EvaluationResult,
    _gap: f64,
) -> Option<ImprovementAction> {
    if !evaluation.has_feedback_at_least(FeedbackSeverity::High) {
        return None;
    }
    let worst = evaluation
        .feedback
        .iter()
        .max_by_key(|f| f.severity)
        .map(|f| f.message.clone())
        .unwrap_or_default();
    Some(
        ImprovementAction::new(
            ActionKind::FeedbackIntegration,
            format!("high-severity evaluator feedback present: {worst}"),
            ActionPriority::Medium,
        )
        .with_parameter("worst_feedback", worst)
        .with_expected_outcome("no high-severity feedback on re-evaluation"),
    )
}

/// The default analyzer set, one per action kind.
pub fn default_analyzers() -> Vec<Analyzer> {
    vec![
        readability_analyzer,
        execution_time_analyzer,
        maintainability_analyzer,
        failed_tests_analyzer,
        gap_analyzer,
        feedback_analyzer,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, Language};
    use crate::evaluation::{Feedback, PerformanceMetrics};

    fn evaluation(metrics: PerformanceMetrics, passed: bool) -> EvaluationResult {
        EvaluationResult {
            task_id: "task-1".to_string(),
            artifact: Artifact::new("a.py", "print('x')", Language::Python),
            metrics,
            passed_tests: passed,
            feedback: vec![],
            suggestions: vec![],
            timestamp: 0,
        }
    }

    fn healthy_metrics() -> PerformanceMetrics {
        PerformanceMetrics {
            complexity_score: 0.9,
            readability_score: 0.9,
            maintainability_score: 0.9,
            test_coverage: 0.9,
            benchmark_score: 0.9,
            ..PerformanceMetrics::default()
        }
    }

    #[test]
    fn test_readability_analyzer_triggers_below_floor() {
        let mut metrics = healthy_metrics();
        metrics.readability_score = 0.3;
        let action = readability_analyzer(&evaluation(metrics, true), 0.0).unwrap();
        assert_eq!(action.kind, ActionKind::GenerationStrategy);
        assert_eq!(action.priority, ActionPriority::High);
    }

    #[test]
    fn test_readability_analyzer_silent_when_healthy() {
        assert!(readability_analyzer(&evaluation(healthy_metrics(), true), 0.0).is_none());
    }

    #[test]
    fn test_execution_time_analyzer_triggers_on_slow_run() {
        let mut metrics = healthy_metrics();
        metrics.execution_time_ms = 2500.0;
        let action = execution_time_analyzer(&evaluation(metrics, true), 0.0).unwrap();
        assert_eq!(action.kind, ActionKind::AlgorithmOptimization);
    }

    #[test]
    fn test_maintainability_analyzer_triggers_below_floor() {
        let mut metrics = healthy_metrics();
        metrics.maintainability_score = 0.2;
        let action = maintainability_analyzer(&evaluation(metrics, true), 0.0).unwrap();
        assert_eq!(action.kind, ActionKind::ArchitectureRefactoring);
        assert_eq!(action.priority, ActionPriority::Medium);
    }

    #[test]
    fn test_failed_tests_analyzer_triggers_on_failure() {
        let action = failed_tests_analyzer(&evaluation(healthy_metrics(), false), 0.0).unwrap();
        assert_eq!(action.kind, ActionKind::TrainingDataEnhancement);
        assert_eq!(
            action.parameters.get("task_id").map(String::as_str),
            Some("task-1")
        );
    }

    #[test]
    fn test_failed_tests_analyzer_silent_on_pass() {
        assert!(failed_tests_analyzer(&evaluation(healthy_metrics(), true), 0.0).is_none());
    }

    #[test]
    fn test_gap_analyzer_triggers_on_large_gap() {
        let action = gap_analyzer(&evaluation(healthy_metrics(), true), 0.4).unwrap();
        assert_eq!(action.kind, ActionKind::ParameterTuning);
        assert_eq!(action.priority, ActionPriority::Critical);
    }

    #[test]
    fn test_gap_analyzer_silent_on_small_gap() {
        assert!(gap_analyzer(&evaluation(healthy_metrics(), true), 0.1).is_none());
    }

    #[test]
    fn test_feedback_analyzer_triggers_on_critical_feedback() {
        let mut eval = evaluation(healthy_metrics(), true);
        eval.feedback.push(Feedback {
            severity: FeedbackSeverity::Critical,
            message: "artifact content is effectively empty".to_string(),
        });
        let action = feedback_analyzer(&eval, 0.0).unwrap();
        assert_eq!(action.kind, ActionKind::FeedbackIntegration);
        assert!(action.description.contains("empty"));
    }

    #[test]
    fn test_feedback_analyzer_silent_on_low_severity() {
        let mut eval = evaluation(healthy_metrics(), true);
        eval.feedback.push(Feedback {
            severity: FeedbackSeverity::Low,
            message: "minor nit".to_string(),
        });
        assert!(feedback_analyzer(&eval, 0.0).is_none());
    }

    #[test]
    fn test_default_analyzers_count() {
        assert_eq!(default_analyzers().len(), 6);
    }

    #[test]
    fn test_healthy_evaluation_emits_no_actions() {
        let eval = evaluation(healthy_metrics(), true);
        let actions: Vec<_> = default_analyzers()
            .iter()
            .filter_map(|a| a(&eval, 0.0))
            .collect();
        assert!(actions.is_empty());
    }
}
