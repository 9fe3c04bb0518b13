//! # CommandCenter — top-level coordinator and public API
//!
//! ## Responsibility
//! Own every subsystem (task store, agent pool, security scanner, sandbox,
//! evaluation pipeline, feedback gate, improvement engine), run the
//! dispatch loop, and expose the orchestration API:
//! `submit` / `status` / `result` / `cancel` / `metrics` / `start` / `stop`.
//!
//! ## Dispatch flow
//!
//! ```text
//! submit ──► TaskStore (pending) ──► dispatch loop ──► agent (capability match)
//!                                         │
//!                                 security scan ──► FeedbackGate (optional)
//!                                         │
//!                                    evaluation ──► pass: complete
//!                                         │
//!                                  one repair pass ──► pass: complete
//!                                         │
//!                                       fail ──► ImprovementEngine / gate
//! ```
//!
//! ## Guarantees
//! - The dispatch loop never terminates on a processing error: task-level
//!   failures are recorded on the task, loop-level errors are logged and
//!   backed off
//! - Every dispatched agent satisfies `can_handle(task)`
//! - `submit` never blocks on processing
//! - `stop` drains in-flight work before returning
//!
//! ## NOT Responsible For
//! - Transport or UI adapters (external collaborators translate this API)
//! - Code synthesis itself (see: agent module)

use crate::agent::debugging::DebugAgent;
use crate::agent::generation::TemplateAgent;
use crate::agent::optimization::OptimizingAgent;
use crate::agent::{Agent, AgentPool, AgentRole};
use crate::artifact::Language;
use crate::config::OrchestratorConfig;
use crate::evaluation::{
    EvaluationPipeline, EvaluationResult, Evaluator, ExecutionEvaluator, StaticQualityEvaluator,
};
use crate::feedback::FeedbackGate;
use crate::improvement::{EngineConfig, ImprovementEngine, QualityMinimums};
use crate::metrics as obs;
use crate::sandbox::{ResourceLimits, Sandbox};
use crate::security::SecurityScanner;
use crate::store::{TaskOutcome, TaskStore};
use crate::task::{Task, TaskStatus};
use crate::OrchestratorError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Figures exposed by [`CommandCenter::metrics`].
#[derive(Debug, Clone)]
pub struct SystemMetrics {
    /// Time since the command center was created.
    pub uptime: Duration,
    /// Tasks that reached completed or failed.
    pub processed: u64,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Registered agents.
    pub active_agents: usize,
    /// Mean wall-clock processing time across processed tasks.
    pub avg_task_time: Duration,
    /// Improvement-engine action success rate.
    pub improvement_success_rate: f64,
}

/// Cloneable bundle of every subsystem the dispatch loop touches.
#[derive(Clone)]
struct Components {
    config: Arc<OrchestratorConfig>,
    store: TaskStore,
    pool: AgentPool,
    scanner: SecurityScanner,
    pipeline: EvaluationPipeline,
    gate: FeedbackGate,
    engine: ImprovementEngine,
}

/// Top-level coordinator owning the full orchestration flow.
pub struct CommandCenter {
    components: Components,
    started_at: Instant,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CommandCenter {
    /// Build a command center from a validated configuration, with the
    /// reference agents (template generation, static debugging, strategy
    /// optimization) registered for every supported language.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidConfig`] when the configuration
    /// fails validation.
    pub fn new(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let config = Arc::new(config);

        let sandbox = Arc::new(Sandbox::new(
            config.sandbox_enabled,
            ResourceLimits {
                max_memory_bytes: config.max_memory_bytes,
                max_execution_time: config.execution_timeout(),
                max_file_size_bytes: config.max_artifact_bytes,
                ..ResourceLimits::default()
            },
        ));

        let mut pipeline =
            EvaluationPipeline::new().register(Arc::new(StaticQualityEvaluator::new()));
        if config.sandbox_enabled {
            pipeline = pipeline.register(Arc::new(ExecutionEvaluator::new(Arc::clone(&sandbox))));
        }

        let pool = AgentPool::new();
        let languages = Language::all().to_vec();
        pool.register(Arc::new(TemplateAgent::new(languages.clone())));
        pool.register(Arc::new(DebugAgent::new(languages.clone())));
        pool.register(Arc::new(OptimizingAgent::new(languages)));

        let gate = FeedbackGate::new(config.human_in_the_loop);
        let engine = ImprovementEngine::new(EngineConfig {
            minimums: QualityMinimums {
                complexity: config.min_complexity_score,
                readability: config.min_readability_score,
                maintainability: config.min_maintainability_score,
                test_coverage: config.min_test_coverage,
            },
            gap_threshold: config.gap_threshold,
            poll_interval: config.improvement_poll_interval(),
            // The polling loop only auto-drains when no human is in the loop.
            auto_apply: !config.human_in_the_loop,
        });

        Ok(Self {
            components: Components {
                config,
                store: TaskStore::new(),
                pool,
                scanner: SecurityScanner::new(),
                pipeline,
                gate,
                engine,
            },
            started_at: Instant::now(),
            shutdown_tx: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Register an additional agent.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        self.components.pool.register(agent);
    }

    /// Register an additional evaluator (takes effect for tasks processed
    /// after the call only if invoked before [`start`](Self::start)).
    pub fn register_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.components.pipeline = self.components.pipeline.clone().register(evaluator);
    }

    /// The feedback gate, for out-of-band approve/reject calls.
    pub fn gate(&self) -> &FeedbackGate {
        &self.components.gate
    }

    /// The improvement engine, for statistics and operator-driven applies.
    pub fn engine(&self) -> &ImprovementEngine {
        &self.components.engine
    }

    /// Enqueue a task and return its id immediately; processing happens on
    /// the dispatch loop.
    pub async fn submit(&self, task: Task) -> String {
        let id = self.components.store.enqueue(task).await;
        let queued = self.components.store.metrics().await.pending;
        obs::set_queue_depth(queued);
        debug!(task_id = %id, queued, "task submitted");
        id
    }

    /// Current status of a task.
    pub async fn status(&self, id: &str) -> TaskStatus {
        self.components.store.status(id).await
    }

    /// Resolved outcome of a task.
    pub async fn result(&self, id: &str) -> TaskOutcome {
        self.components.store.result(id).await
    }

    /// Cancel a pending or in-progress task. Advisory for in-flight work:
    /// the running agent or sandbox session is not preempted.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::store::StoreError`] for unknown ids and
    /// already-terminal tasks.
    pub async fn cancel(&self, id: &str) -> Result<(), OrchestratorError> {
        self.components.store.cancel(id).await?;
        obs::record_task_terminal("cancelled");
        Ok(())
    }

    /// Aggregate system metrics.
    pub async fn metrics(&self) -> SystemMetrics {
        let store = self.components.store.metrics().await;
        let improvement = self.components.engine.statistics();
        SystemMetrics {
            uptime: self.started_at.elapsed(),
            processed: store.processed,
            queued: store.pending,
            active_agents: self.components.pool.len(),
            avg_task_time: store.avg_processing_time,
            improvement_success_rate: improvement.success_rate,
        }
    }

    /// Whether the dispatch loop is running.
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.lock().is_some()
    }

    /// Start the dispatch loop and the improvement polling loop.
    /// Idempotent: calling `start` while running is a no-op.
    pub fn start(&self) {
        let mut guard = self.shutdown_tx.lock();
        if guard.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let dispatch = tokio::spawn(dispatch_loop(self.components.clone(), rx.clone()));
        let improvement = self.components.engine.spawn(rx);
        *guard = Some(tx);
        self.handles.lock().extend([dispatch, improvement]);
        info!("command center started");
    }

    /// Stop gracefully: signal shutdown, then wait for the dispatch loop to
    /// finish its in-flight task and for the improvement loop to exit.
    /// Sandbox sessions end with the task they belong to (bounded by the
    /// watchdog); queued tasks stay pending for the next `start`.
    pub async fn stop(&self) {
        let sender = self.shutdown_tx.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(true);
        }
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock();
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("command center stopped");
    }
}

// ─── Dispatch loop ───────────────────────────────────────────────────────────

/// Single logical consumer: pop the queue head, process it, never die.
async fn dispatch_loop(components: Components, mut shutdown: watch::Receiver<bool>) {
    info!("dispatch loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match components.store.dequeue().await {
            None => {
                // Idle: sleep briefly, but wake early on shutdown.
                tokio::select! {
                    _ = tokio::time::sleep(components.config.dispatch_idle()) => {}
                    _ = shutdown.changed() => {}
                }
            }
            Some(task) => {
                let task_id = task.id.clone();
                let started = Instant::now();
                obs::set_queue_depth(components.store.metrics().await.pending);

                if let Err(e) = process_task(&components, task).await {
                    // Task-level failure: record it on the task and move on.
                    warn!(task_id = %task_id, error = %e, "task processing failed");
                    match components.store.fail(&task_id, e.to_string()).await {
                        Ok(()) => obs::record_task_terminal("failed"),
                        Err(record_err) => {
                            // Loop-level error (e.g. the record vanished):
                            // log, back off, keep going.
                            error!(
                                task_id = %task_id,
                                error = %record_err,
                                "failed to record task failure; backing off"
                            );
                            tokio::time::sleep(components.config.error_backoff()).await;
                        }
                    }
                }
                obs::observe_task_duration(started.elapsed());
            }
        }
    }
    info!("dispatch loop exited");
}

/// Process one task end to end. Returning `Ok` means the task reached a
/// terminal status (completed or failed-with-improvement); returning `Err`
/// means the caller must record the failure.
async fn process_task(components: &Components, task: Task) -> Result<(), OrchestratorError> {
    let config = &components.config;
    components
        .store
        .update_status(&task.id, TaskStatus::InProgress)
        .await?;

    // Capability-matched selection (random tie-break among eligible
    // generation agents); the pool guarantees can_handle.
    let agent = components
        .pool
        .select_role(&task, AgentRole::Generation)?;
    debug!(task_id = %task.id, agent = agent.name(), "agent selected");
    let artifact = agent.execute(&task, None).await?;

    // Security validation, optionally gated.
    let report = components.scanner.validate(&artifact);
    if !report.is_secure {
        let approved = components
            .gate
            .request_approval(&artifact, &report.issues);
        if !approved {
            return Err(OrchestratorError::PermissionDenied(format!(
                "artifact rejected by security gate ({} issues)",
                report.issues.len()
            )));
        }
        if !config.human_in_the_loop {
            warn!(
                task_id = %task.id,
                issues = report.issues.len(),
                "insecure artifact auto-approved: human_in_the_loop is disabled"
            );
        }
    }

    // First evaluation.
    let evaluation = components.pipeline.run(&task, &artifact).await?;
    if evaluation.passed_tests {
        components.store.complete(&task.id, artifact).await?;
        obs::record_task_terminal("completed");
        info!(task_id = %task.id, "task completed");
        return Ok(());
    }

    // Exactly one repair pass through a debugging-capable agent.
    let final_evaluation = match components.pool.select_role(&task, AgentRole::Debugging) {
        Ok(debugger) => {
            debug!(task_id = %task.id, agent = debugger.name(), "repair pass");
            let repaired = debugger.execute(&task, Some(&artifact)).await?;
            let re_evaluation = components.pipeline.run(&task, &repaired).await?;
            if re_evaluation.passed_tests {
                components.store.complete(&task.id, repaired).await?;
                obs::record_task_terminal("completed");
                info!(task_id = %task.id, "task completed after repair");
                return Ok(());
            }
            re_evaluation
        }
        Err(_) => {
            debug!(task_id = %task.id, "no debugging-capable agent; skipping repair");
            evaluation
        }
    };

    // Terminal failure; hand the evaluation to the improvement engine.
    components
        .store
        .fail(&task.id, failure_message(&final_evaluation))
        .await?;
    obs::record_task_terminal("failed");
    info!(task_id = %task.id, "task failed evaluation");

    if config.improvement_enabled {
        let actions = components.engine.analyze(&final_evaluation);
        for action in actions {
            if config.auto_apply_improvements && !config.human_in_the_loop {
                if let Err(e) = components.engine.apply(&action.id).await {
                    warn!(action_id = %action.id, error = %e, "improvement apply failed");
                }
            } else {
                components.gate.propose(&action);
            }
        }
    }

    Ok(())
}

/// Condense evaluator feedback into the task's failure message.
fn failure_message(evaluation: &EvaluationResult) -> String {
    if evaluation.feedback.is_empty() {
        "evaluation failed".to_string()
    } else {
        let details: Vec<&str> = evaluation
            .feedback
            .iter()
            .map(|f| f.message.as_str())
            .take(3)
            .collect();
        format!("evaluation failed: {}", details.join("; "))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
