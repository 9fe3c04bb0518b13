//! # ImprovementEngine — gap analysis, handlers, learning loop
//!
//! ## Responsibility
//! Persist evaluations, derive remediation actions from the worst
//! individual quality shortfall, apply actions through the kind→handler
//! registry with before/after measurement, and run the periodic loop that
//! drains pending actions when auto-apply is on.
//!
//! ## Guarantees
//! - Single-writer: all state mutation is serialized through one mutex
//! - Monotonic action status: terminal states never revert
//! - One LearningExperience per applied action
//! - Handler failures mark the action failed, then propagate to the caller
//!
//! ## Known limitation
//! Under human-in-the-loop mode the polling loop leaves pending actions
//! untouched indefinitely; there is no expiry or re-prioritization, so
//! pending actions can starve until an operator applies them.

use crate::artifact::unix_now;
use crate::evaluation::{EvaluationResult, PerformanceMetrics};
use crate::improvement::action::{
    ActionKind, ActionStatus, ImprovementAction, LearningExperience,
};
use crate::improvement::analyzers::{default_analyzers, Analyzer};
use crate::improvement::ImprovementError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Minimum acceptable values for the four gap-checked quality dimensions.
#[derive(Debug, Clone)]
pub struct QualityMinimums {
    /// Minimum complexity score.
    pub complexity: f64,
    /// Minimum readability score.
    pub readability: f64,
    /// Minimum maintainability score.
    pub maintainability: f64,
    /// Minimum test coverage.
    pub test_coverage: f64,
}

impl Default for QualityMinimums {
    fn default() -> Self {
        Self {
            complexity: 0.7,
            readability: 0.7,
            maintainability: 0.7,
            test_coverage: 0.7,
        }
    }
}

/// Configuration for the improvement engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quality minimums used for gap computation.
    pub minimums: QualityMinimums,
    /// Gap at or below which no actions are generated.
    pub gap_threshold: f64,
    /// Polling interval for the pending-action loop.
    pub poll_interval: Duration,
    /// Whether the polling loop applies pending actions. Off under
    /// human-in-the-loop mode: actions stay pending for an operator.
    pub auto_apply: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimums: QualityMinimums::default(),
            gap_threshold: 0.05,
            poll_interval: Duration::from_secs(5),
            auto_apply: true,
        }
    }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

/// Remediation executor for one action kind (1:1 kind→handler mapping).
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action kind this handler serves.
    fn kind(&self) -> ActionKind;

    /// Run the remediation. `baseline` is the most recent stored metrics
    /// snapshot. Returning `Some(metrics)` records a fresh post-remediation
    /// measurement; `None` means the remediation produced no new snapshot.
    ///
    /// # Errors
    ///
    /// Any [`ImprovementError`] marks the action failed and is re-raised
    /// to the caller of `apply`.
    async fn remediate(
        &self,
        action: &ImprovementAction,
        baseline: &PerformanceMetrics,
    ) -> Result<Option<PerformanceMetrics>, ImprovementError>;
}

/// Reference handler: simulates remediation with a fixed delay, standing in
/// for a real regeneration/refactor/retrain step, and reports the baseline
/// scaled by a configurable uplift.
pub struct SimulatedHandler {
    kind: ActionKind,
    delay: Duration,
    uplift: f64,
}

impl SimulatedHandler {
    /// Create a handler for the given kind with a 50 ms delay and a 10%
    /// uplift on the quality dimensions.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            delay: Duration::from_millis(50),
            uplift: 1.10,
        }
    }

    /// Override the simulated work delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Override the uplift factor (1.0 = no improvement).
    pub fn with_uplift(mut self, uplift: f64) -> Self {
        self.uplift = uplift;
        self
    }
}

#[async_trait]
impl ActionHandler for SimulatedHandler {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    async fn remediate(
        &self,
        _action: &ImprovementAction,
        baseline: &PerformanceMetrics,
    ) -> Result<Option<PerformanceMetrics>, ImprovementError> {
        tokio::time::sleep(self.delay).await;
        let mut after = baseline.clone();
        after.complexity_score = (after.complexity_score * self.uplift).clamp(0.0, 1.0);
        after.readability_score = (after.readability_score * self.uplift).clamp(0.0, 1.0);
        after.maintainability_score = (after.maintainability_score * self.uplift).clamp(0.0, 1.0);
        after.test_coverage = (after.test_coverage * self.uplift).clamp(0.0, 1.0);
        after.benchmark_score = (after.benchmark_score * self.uplift).clamp(0.0, 1.0);
        Ok(Some(after))
    }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Aggregate figures for the improvement loop.
#[derive(Debug, Clone, Default)]
pub struct ImprovementStatistics {
    /// All actions ever generated.
    pub total_actions: usize,
    /// Actions with status `Completed`.
    pub successful_actions: usize,
    /// Actions with status `Failed`.
    pub failed_actions: usize,
    /// `successful / total` (0.0 when no actions exist).
    pub success_rate: f64,
    /// Mean improvement ratio across recorded experiences.
    pub average_improvement_ratio: f64,
    /// Number of recorded learning experiences.
    pub total_experiences: usize,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

struct EngineInner {
    evaluations: Vec<EvaluationResult>,
    metrics_history: Vec<PerformanceMetrics>,
    actions: Vec<ImprovementAction>,
    experiences: Vec<LearningExperience>,
    analyzers: Vec<Analyzer>,
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

/// The closed-loop improvement engine. Clone is cheap (Arc-backed); all
/// clones share state.
#[derive(Clone)]
pub struct ImprovementEngine {
    inner: Arc<Mutex<EngineInner>>,
    config: EngineConfig,
}

impl ImprovementEngine {
    /// Create an engine with the default analyzers and a simulated handler
    /// per action kind.
    pub fn new(config: EngineConfig) -> Self {
        let handlers = ActionKind::all()
            .iter()
            .map(|kind| {
                (
                    *kind,
                    Arc::new(SimulatedHandler::new(*kind)) as Arc<dyn ActionHandler>,
                )
            })
            .collect();
        Self::assemble(config, default_analyzers(), handlers)
    }

    /// Create an engine with explicit handlers (analyzers stay default).
    pub fn with_handlers(config: EngineConfig, handlers: Vec<Arc<dyn ActionHandler>>) -> Self {
        let map = handlers.into_iter().map(|h| (h.kind(), h)).collect();
        Self::assemble(config, default_analyzers(), map)
    }

    fn assemble(
        config: EngineConfig,
        analyzers: Vec<Analyzer>,
        handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                evaluations: Vec::new(),
                metrics_history: Vec::new(),
                actions: Vec::new(),
                experiences: Vec::new(),
                analyzers,
                handlers,
            })),
            config,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register (or replace) the handler for its kind.
    pub fn register_handler(&self, handler: Arc<dyn ActionHandler>) {
        self.inner.lock().handlers.insert(handler.kind(), handler);
    }

    /// Register an additional analyzer.
    pub fn register_analyzer(&self, analyzer: Analyzer) {
        self.inner.lock().analyzers.push(analyzer);
    }

    /// The single worst shortfall among the gap-checked dimensions below
    /// their configured minimums — the maximum individual deficit, not a sum.
    pub fn performance_gap(&self, metrics: &PerformanceMetrics) -> f64 {
        let minimums = &self.config.minimums;
        [
            minimums.complexity - metrics.complexity_score,
            minimums.readability - metrics.readability_score,
            minimums.maintainability - metrics.maintainability_score,
            minimums.test_coverage - metrics.test_coverage,
        ]
        .into_iter()
        .fold(0.0f64, |acc, deficit| acc.max(deficit.max(0.0)))
    }

    /// Persist an evaluation and derive remediation actions from its gap.
    ///
    /// Returns no actions when the gap is at or below the configured
    /// threshold; otherwise every emitted action is persisted and the list
    /// is returned sorted by priority descending.
    pub fn analyze(&self, evaluation: &EvaluationResult) -> Vec<ImprovementAction> {
        let gap = self.performance_gap(&evaluation.metrics);
        let mut inner = self.inner.lock();
        inner.evaluations.push(evaluation.clone());
        inner.metrics_history.push(evaluation.metrics.clone());

        if gap <= self.config.gap_threshold {
            debug!(gap, threshold = self.config.gap_threshold, "gap within threshold");
            return Vec::new();
        }

        let mut actions: Vec<ImprovementAction> = inner
            .analyzers
            .iter()
            .filter_map(|analyzer| analyzer(evaluation, gap))
            .collect();
        actions.sort_by(|a, b| b.priority.cmp(&a.priority));
        inner.actions.extend(actions.iter().cloned());
        info!(
            gap,
            actions = actions.len(),
            task_id = %evaluation.task_id,
            "improvement actions generated"
        );
        actions
    }

    /// Apply one action: mark in-progress, snapshot before metrics, run the
    /// handler, snapshot after metrics, and record the learning experience.
    ///
    /// # Errors
    ///
    /// - [`ImprovementError::ActionNotFound`] for unknown ids
    /// - [`ImprovementError::ActionTerminal`] when already terminal
    /// - [`ImprovementError::MissingHandler`] when no handler serves the
    ///   kind (the action is marked failed first)
    /// - Handler errors, after the action is marked failed
    pub async fn apply(&self, action_id: &str) -> Result<LearningExperience, ImprovementError> {
        let (handler, action_snapshot, before, task_id) = {
            let mut inner = self.inner.lock();
            let idx = inner
                .actions
                .iter()
                .position(|a| a.id == action_id)
                .ok_or_else(|| ImprovementError::ActionNotFound(action_id.to_string()))?;
            if inner.actions[idx].status.is_terminal() {
                return Err(ImprovementError::ActionTerminal {
                    id: action_id.to_string(),
                    status: inner.actions[idx].status,
                });
            }
            let kind = inner.actions[idx].kind;
            let handler = match inner.handlers.get(&kind) {
                Some(h) => Arc::clone(h),
                None => {
                    inner.actions[idx].status = ActionStatus::Failed;
                    inner.actions[idx].applied_at = Some(unix_now());
                    return Err(ImprovementError::MissingHandler(kind));
                }
            };
            inner.actions[idx].status = ActionStatus::InProgress;
            let before = inner.metrics_history.last().cloned().unwrap_or_default();
            let task_id = inner
                .evaluations
                .last()
                .map(|e| e.task_id.clone())
                .unwrap_or_default();
            (handler, inner.actions[idx].clone(), before, task_id)
        };

        let remediation = handler.remediate(&action_snapshot, &before).await;

        let mut inner = self.inner.lock();
        let idx = inner
            .actions
            .iter()
            .position(|a| a.id == action_id)
            .ok_or_else(|| ImprovementError::ActionNotFound(action_id.to_string()))?;

        match remediation {
            Err(e) => {
                inner.actions[idx].status = ActionStatus::Failed;
                inner.actions[idx].applied_at = Some(unix_now());
                warn!(action_id, error = %e, "handler failed");
                Err(e)
            }
            Ok(maybe_after) => {
                if let Some(after) = maybe_after {
                    inner.metrics_history.push(after);
                }
                let after = inner.metrics_history.last().cloned().unwrap_or_default();
                let experience = LearningExperience::from_snapshots(
                    task_id,
                    action_id.to_string(),
                    before,
                    after,
                );
                inner.actions[idx].status = if experience.success {
                    ActionStatus::Completed
                } else {
                    ActionStatus::Failed
                };
                inner.actions[idx].applied_at = Some(unix_now());
                inner.experiences.push(experience.clone());
                crate::metrics::record_improvement_action(
                    inner.actions[idx].kind.as_str(),
                    &inner.actions[idx].status.to_string(),
                );
                info!(
                    action_id,
                    success = experience.success,
                    ratio = experience.improvement_ratio,
                    "action applied"
                );
                Ok(experience)
            }
        }
    }

    /// All actions still pending.
    pub fn pending_actions(&self) -> Vec<ImprovementAction> {
        self.inner
            .lock()
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .cloned()
            .collect()
    }

    /// All actions ever generated.
    pub fn actions(&self) -> Vec<ImprovementAction> {
        self.inner.lock().actions.clone()
    }

    /// Look up one action by id.
    pub fn action(&self, id: &str) -> Option<ImprovementAction> {
        self.inner.lock().actions.iter().find(|a| a.id == id).cloned()
    }

    /// All recorded learning experiences.
    pub fn experiences(&self) -> Vec<LearningExperience> {
        self.inner.lock().experiences.clone()
    }

    /// Aggregate statistics over actions and experiences.
    pub fn statistics(&self) -> ImprovementStatistics {
        let inner = self.inner.lock();
        let total = inner.actions.len();
        let successful = inner
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Completed)
            .count();
        let failed = inner
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Failed)
            .count();
        let average_improvement_ratio = if inner.experiences.is_empty() {
            0.0
        } else {
            inner
                .experiences
                .iter()
                .map(|e| e.improvement_ratio)
                .sum::<f64>()
                / inner.experiences.len() as f64
        };
        ImprovementStatistics {
            total_actions: total,
            successful_actions: successful,
            failed_actions: failed,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            average_improvement_ratio,
            total_experiences: inner.experiences.len(),
        }
    }

    /// Spawn the periodic loop draining pending actions.
    ///
    /// Every `poll_interval` the loop fetches all pending actions. With
    /// `auto_apply` on it applies each; otherwise it leaves them pending
    /// for an operator (no expiry — documented starvation limitation).
    /// The loop exits when the shutdown channel flips to `true` or closes.
    pub fn spawn(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = self.clone();
        let interval = self.config.poll_interval;
        tokio::spawn(async move {
            info!("improvement loop started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
                if !engine.config.auto_apply {
                    continue;
                }
                for action in engine.pending_actions() {
                    if let Err(e) = engine.apply(&action.id).await {
                        warn!(action_id = %action.id, error = %e, "pending action failed to apply");
                    }
                }
            }
            info!("improvement loop exited");
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
