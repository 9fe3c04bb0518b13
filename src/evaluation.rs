//! # Evaluation — pluggable quality judgment over artifacts
//!
//! ## Responsibility
//! Define performance metrics, the `Evaluator` trait, and the pipeline that
//! runs an ordered list of evaluators over the same artifact/task pair and
//! merges their verdicts.
//!
//! ## Merge discipline
//! The merge rule is deliberately asymmetric and must be preserved exactly:
//! - `passed_tests` is the logical AND across all evaluators
//! - resource-cost dimensions take the worst case (max): execution time,
//!   memory usage, cpu usage, test coverage
//! - quality-score dimensions take the average: complexity, readability,
//!   maintainability, benchmark
//! - feedback and suggestions concatenate in evaluator order
//!
//! Never report a resource number better than the worst evaluator saw.
//!
//! ## NOT Responsible For
//! - Producing artifacts (see: agent module)
//! - Remediation of shortfalls (see: improvement module)

use crate::artifact::{unix_now, Artifact};
use crate::sandbox::Sandbox;
use crate::task::Task;
use crate::OrchestratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// Quality and performance scores for one artifact.
///
/// Resource dimensions (`execution_time_ms`, `memory_usage`, `cpu_usage`)
/// are open-ended magnitudes; the five quality dimensions are 0.0–1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Wall-clock execution time in milliseconds.
    pub execution_time_ms: f64,
    /// Memory usage in bytes (best-effort).
    pub memory_usage: f64,
    /// CPU usage fraction (best-effort).
    pub cpu_usage: f64,
    /// Structural simplicity score (1.0 = simplest).
    pub complexity_score: f64,
    /// Readability score.
    pub readability_score: f64,
    /// Maintainability score.
    pub maintainability_score: f64,
    /// Fraction of requirements exercised by checks.
    pub test_coverage: f64,
    /// Benchmark score.
    pub benchmark_score: f64,
}

impl PerformanceMetrics {
    /// Overall quality: the unweighted mean of the five 0–1 dimensions.
    pub fn overall_score(&self) -> f64 {
        (self.complexity_score
            + self.readability_score
            + self.maintainability_score
            + self.test_coverage
            + self.benchmark_score)
            / 5.0
    }

    /// Merge two metric sets under the asymmetric rule: max for resource
    /// dimensions (and test coverage), average for quality dimensions.
    pub fn merge(&self, other: &PerformanceMetrics) -> PerformanceMetrics {
        PerformanceMetrics {
            execution_time_ms: self.execution_time_ms.max(other.execution_time_ms),
            memory_usage: self.memory_usage.max(other.memory_usage),
            cpu_usage: self.cpu_usage.max(other.cpu_usage),
            test_coverage: self.test_coverage.max(other.test_coverage),
            complexity_score: (self.complexity_score + other.complexity_score) / 2.0,
            readability_score: (self.readability_score + other.readability_score) / 2.0,
            maintainability_score: (self.maintainability_score + other.maintainability_score)
                / 2.0,
            benchmark_score: (self.benchmark_score + other.benchmark_score) / 2.0,
        }
    }
}

// ─── Feedback ────────────────────────────────────────────────────────────────

/// Severity of an evaluator finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSeverity {
    /// Informational note.
    Info,
    /// Minor concern.
    Low,
    /// Noticeable concern.
    Medium,
    /// Significant defect.
    High,
    /// Blocking defect.
    Critical,
}

impl fmt::Display for FeedbackSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A single evaluator finding with its severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// How serious the finding is.
    pub severity: FeedbackSeverity,
    /// Human-readable description.
    pub message: String,
}

// ─── EvaluationResult ────────────────────────────────────────────────────────

/// Quality verdict on an artifact. Append-only: one per evaluation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The task the artifact was produced for.
    pub task_id: String,
    /// The evaluated artifact.
    pub artifact: Artifact,
    /// Measured metrics.
    pub metrics: PerformanceMetrics,
    /// Overall pass/fail verdict.
    pub passed_tests: bool,
    /// Findings, in evaluator order.
    pub feedback: Vec<Feedback>,
    /// Actionable suggestions, in evaluator order.
    pub suggestions: Vec<String>,
    /// Unix timestamp (seconds) when the evaluation finished.
    pub timestamp: u64,
}

impl EvaluationResult {
    /// Merge an ordered list of results for the same artifact/task pair.
    ///
    /// Returns `None` for an empty list. `passed_tests` is the AND across
    /// all verdicts; metrics merge under the asymmetric rule; feedback and
    /// suggestions concatenate in order.
    pub fn merge_all(mut results: Vec<EvaluationResult>) -> Option<EvaluationResult> {
        if results.is_empty() {
            return None;
        }
        let mut merged = results.remove(0);
        for next in results {
            merged.passed_tests = merged.passed_tests && next.passed_tests;
            merged.metrics = merged.metrics.merge(&next.metrics);
            merged.feedback.extend(next.feedback);
            merged.suggestions.extend(next.suggestions);
            merged.timestamp = merged.timestamp.max(next.timestamp);
        }
        Some(merged)
    }

    /// Return `true` if any finding is at or above the given severity.
    pub fn has_feedback_at_least(&self, severity: FeedbackSeverity) -> bool {
        self.feedback.iter().any(|f| f.severity >= severity)
    }
}

// ─── Evaluator trait & pipeline ──────────────────────────────────────────────

/// A pluggable judge producing metrics for an artifact.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// tasks. The trait is object-safe to allow dynamic dispatch via
/// `Arc<dyn Evaluator>`.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Evaluate one artifact against its task.
    async fn evaluate(
        &self,
        task: &Task,
        artifact: &Artifact,
    ) -> Result<EvaluationResult, OrchestratorError>;
}

/// Runs an ordered list of evaluators and merges their results.
#[derive(Clone, Default)]
pub struct EvaluationPipeline {
    evaluators: Vec<Arc<dyn Evaluator>>,
}

impl EvaluationPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    /// Append an evaluator; evaluation order is registration order.
    pub fn register(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    /// Number of registered evaluators.
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    /// Whether the pipeline has no evaluators.
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Run every evaluator in order and merge the results.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::ValidationFailed`] when no evaluators are
    ///   registered
    /// - Any error from an individual evaluator, propagated as-is
    pub async fn run(
        &self,
        task: &Task,
        artifact: &Artifact,
    ) -> Result<EvaluationResult, OrchestratorError> {
        if self.evaluators.is_empty() {
            return Err(OrchestratorError::ValidationFailed(
                "evaluation pipeline has no evaluators".to_string(),
            ));
        }
        let mut results = Vec::with_capacity(self.evaluators.len());
        for evaluator in &self.evaluators {
            let result = evaluator.evaluate(task, artifact).await?;
            debug!(
                evaluator = evaluator.name(),
                passed = result.passed_tests,
                overall = result.metrics.overall_score(),
                "evaluator finished"
            );
            results.push(result);
        }
        EvaluationResult::merge_all(results).ok_or_else(|| {
            OrchestratorError::ValidationFailed("evaluation produced no results".to_string())
        })
    }
}

// ─── Static quality evaluator ────────────────────────────────────────────────

/// Heuristic static evaluator: scores structure, readability, and
/// requirement coverage without executing anything.
///
/// The signals are deliberately cheap text heuristics; they exist to rank
/// artifacts relative to each other, not to be absolute measurements.
#[derive(Debug, Clone)]
pub struct StaticQualityEvaluator {
    /// Minimum content length below which the artifact is flagged.
    pub min_content_len: usize,
}

impl Default for StaticQualityEvaluator {
    fn default() -> Self {
        Self {
            min_content_len: 10,
        }
    }
}

impl StaticQualityEvaluator {
    /// Create an evaluator with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    fn complexity(content: &str) -> f64 {
        // Deep nesting reads as complexity; measure the worst indent depth.
        let max_indent = content
            .lines()
            .map(|l| l.chars().take_while(|c| *c == ' ').count() / 4)
            .max()
            .unwrap_or(0);
        (1.0 - max_indent as f64 * 0.15).clamp(0.0, 1.0)
    }

    fn readability(content: &str, comment_prefix: &str) -> f64 {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return 0.0;
        }
        let comment_lines = lines
            .iter()
            .filter(|l| l.trim_start().starts_with(comment_prefix))
            .count();
        let long_lines = lines.iter().filter(|l| l.len() > 100).count();
        let comment_ratio = comment_lines as f64 / lines.len() as f64;
        let long_penalty = long_lines as f64 / lines.len() as f64;
        (0.5 + comment_ratio - long_penalty).clamp(0.0, 1.0)
    }

    fn maintainability(content: &str) -> f64 {
        let line_count = content.lines().count();
        if line_count == 0 {
            return 0.0;
        }
        // Shorter units are easier to maintain; degrade slowly past 200 lines.
        (1.0 - (line_count as f64 / 400.0)).clamp(0.2, 1.0)
    }

    fn coverage(task: &Task, content: &str) -> f64 {
        if task.requirements.is_empty() {
            // Mirror the "no question words" default: neither penalise nor
            // reward artifacts for unstated requirements.
            return 0.7;
        }
        let lower = content.to_lowercase();
        let addressed = task
            .requirements
            .iter()
            .filter(|req| {
                req.to_lowercase()
                    .split_whitespace()
                    .any(|word| word.len() > 3 && lower.contains(word))
            })
            .count();
        addressed as f64 / task.requirements.len() as f64
    }
}

#[async_trait]
impl Evaluator for StaticQualityEvaluator {
    fn name(&self) -> &str {
        "static-quality"
    }

    async fn evaluate(
        &self,
        task: &Task,
        artifact: &Artifact,
    ) -> Result<EvaluationResult, OrchestratorError> {
        let content = &artifact.content;
        let complexity = Self::complexity(content);
        let readability = Self::readability(content, artifact.language.comment_prefix());
        let maintainability = Self::maintainability(content);
        let coverage = Self::coverage(task, content);
        // Longer artifacts earn benchmark confidence, with diminishing returns.
        let benchmark = (1.0 - 1.0 / (content.len() as f64).sqrt().max(1.0)).clamp(0.0, 1.0);

        let mut feedback = Vec::new();
        let mut suggestions = Vec::new();
        if content.trim().len() < self.min_content_len {
            feedback.push(Feedback {
                severity: FeedbackSeverity::Critical,
                message: "artifact content is effectively empty".to_string(),
            });
        }
        if readability < 0.4 {
            feedback.push(Feedback {
                severity: FeedbackSeverity::Medium,
                message: "low readability".to_string(),
            });
            suggestions.push("add explanatory comments and shorten long lines".to_string());
        }
        if complexity < 0.4 {
            feedback.push(Feedback {
                severity: FeedbackSeverity::Medium,
                message: "deeply nested structure".to_string(),
            });
            suggestions.push("flatten nested blocks into helper functions".to_string());
        }
        if coverage < 0.5 && !task.requirements.is_empty() {
            feedback.push(Feedback {
                severity: FeedbackSeverity::High,
                message: "requirements not addressed by the artifact".to_string(),
            });
            suggestions.push("address each stated requirement explicitly".to_string());
        }

        let passed_tests =
            content.trim().len() >= self.min_content_len && coverage >= 0.5;

        Ok(EvaluationResult {
            task_id: task.id.clone(),
            artifact: artifact.clone(),
            metrics: PerformanceMetrics {
                execution_time_ms: 0.0,
                memory_usage: 0.0,
                cpu_usage: 0.0,
                complexity_score: complexity,
                readability_score: readability,
                maintainability_score: maintainability,
                test_coverage: coverage,
                benchmark_score: benchmark,
            },
            passed_tests,
            feedback,
            suggestions,
            timestamp: unix_now(),
        })
    }
}

// ─── Execution evaluator ─────────────────────────────────────────────────────

/// Sandbox-backed evaluator: runs the artifact and scores the outcome.
///
/// Quality dimensions it cannot measure are reported at the neutral
/// midpoint (0.5) so runtime signals don't swamp static scores in the
/// averaged merge.
pub struct ExecutionEvaluator {
    sandbox: Arc<Sandbox>,
}

impl ExecutionEvaluator {
    /// Create an evaluator backed by the given sandbox.
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Evaluator for ExecutionEvaluator {
    fn name(&self) -> &str {
        "sandbox-execution"
    }

    async fn evaluate(
        &self,
        task: &Task,
        artifact: &Artifact,
    ) -> Result<EvaluationResult, OrchestratorError> {
        let run = self.sandbox.execute(artifact, None).await?;

        let limit_ms = self.sandbox.limits().max_execution_time.as_millis() as f64;
        let elapsed_ms = run.execution_time.as_millis() as f64;
        let benchmark = if run.success {
            (1.0 - elapsed_ms / limit_ms.max(1.0)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut feedback = Vec::new();
        let mut suggestions = Vec::new();
        for error in &run.errors {
            feedback.push(Feedback {
                severity: if run.success {
                    FeedbackSeverity::Low
                } else {
                    FeedbackSeverity::Critical
                },
                message: error.clone(),
            });
        }
        if !run.success {
            suggestions.push("fix the runtime failure reported by the sandbox".to_string());
        }

        Ok(EvaluationResult {
            task_id: task.id.clone(),
            artifact: artifact.clone(),
            metrics: PerformanceMetrics {
                execution_time_ms: elapsed_ms,
                memory_usage: run.memory_usage as f64,
                cpu_usage: 0.0,
                complexity_score: 0.5,
                readability_score: 0.5,
                maintainability_score: 0.5,
                test_coverage: if run.success { 0.7 } else { 0.0 },
                benchmark_score: benchmark,
            },
            passed_tests: run.success,
            feedback,
            suggestions,
            timestamp: unix_now(),
        })
    }
}
