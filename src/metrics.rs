//! Prometheus metrics for the orchestration engine.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup **before** starting the
//! command center. The helper functions (`record_task_terminal`,
//! `set_queue_depth`, …) are no-ops if `init_metrics` was never called, so
//! the engine is always safe to run — observability simply degrades
//! gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `autoforge_tasks_total` | Counter | `status` |
//! | `autoforge_task_duration_seconds` | Histogram | — |
//! | `autoforge_queue_depth` | Gauge | — |
//! | `autoforge_sandbox_runs_total` | Counter | `outcome` |
//! | `autoforge_sandbox_duration_seconds` | Histogram | — |
//! | `autoforge_improvement_actions_total` | Counter | `kind`, `status` |

use crate::OrchestratorError;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the engine, bundled together so they can be
/// stored in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Tasks reaching a terminal status, by status.
    pub tasks_total: CounterVec,
    /// Wall-clock processing time per task.
    pub task_duration: Histogram,
    /// Current number of queued tasks.
    pub queue_depth: IntGauge,
    /// Sandbox runs by outcome.
    pub sandbox_runs: CounterVec,
    /// Wall-clock time per sandbox run.
    pub sandbox_duration: Histogram,
    /// Improvement actions reaching a terminal status, by kind and status.
    pub improvement_actions: CounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private
/// registry. Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`OrchestratorError::ValidationFailed`] if metric construction
/// or registry registration fails (e.g., duplicate descriptor names).
pub fn init_metrics() -> Result<(), OrchestratorError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();
    let fail = |e: prometheus::Error| {
        OrchestratorError::ValidationFailed(format!("metrics init failed: {e}"))
    };

    let tasks_total = CounterVec::new(
        Opts::new("autoforge_tasks_total", "Tasks by terminal status"),
        &["status"],
    )
    .map_err(fail)?;
    registry
        .register(Box::new(tasks_total.clone()))
        .map_err(fail)?;

    let task_duration = Histogram::with_opts(HistogramOpts::new(
        "autoforge_task_duration_seconds",
        "Wall-clock processing time per task",
    ))
    .map_err(fail)?;
    registry
        .register(Box::new(task_duration.clone()))
        .map_err(fail)?;

    let queue_depth =
        IntGauge::new("autoforge_queue_depth", "Current queued tasks").map_err(fail)?;
    registry
        .register(Box::new(queue_depth.clone()))
        .map_err(fail)?;

    let sandbox_runs = CounterVec::new(
        Opts::new("autoforge_sandbox_runs_total", "Sandbox runs by outcome"),
        &["outcome"],
    )
    .map_err(fail)?;
    registry
        .register(Box::new(sandbox_runs.clone()))
        .map_err(fail)?;

    let sandbox_duration = Histogram::with_opts(HistogramOpts::new(
        "autoforge_sandbox_duration_seconds",
        "Wall-clock time per sandbox run",
    ))
    .map_err(fail)?;
    registry
        .register(Box::new(sandbox_duration.clone()))
        .map_err(fail)?;

    let improvement_actions = CounterVec::new(
        Opts::new(
            "autoforge_improvement_actions_total",
            "Improvement actions by kind and terminal status",
        ),
        &["kind", "status"],
    )
    .map_err(fail)?;
    registry
        .register(Box::new(improvement_actions.clone()))
        .map_err(fail)?;

    // If another thread raced us, the first one wins — both initializations
    // produce identical metric descriptors, so neither outcome is incorrect.
    let _ = METRICS.set(Metrics {
        registry,
        tasks_total,
        task_duration,
        queue_depth,
        sandbox_runs,
        sandbox_duration,
        improvement_actions,
    });

    Ok(())
}

/// Return a reference to the initialised [`Metrics`], or `None` if
/// [`init_metrics`] has not been called yet.
fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count a task reaching a terminal status. No-op if uninitialised.
pub fn record_task_terminal(status: &str) {
    if let Some(m) = metrics() {
        m.tasks_total.with_label_values(&[status]).inc();
    }
}

/// Record the processing time of one task. No-op if uninitialised.
pub fn observe_task_duration(duration: Duration) {
    if let Some(m) = metrics() {
        m.task_duration.observe(duration.as_secs_f64());
    }
}

/// Set the current queue depth. No-op if uninitialised.
pub fn set_queue_depth(depth: usize) {
    if let Some(m) = metrics() {
        m.queue_depth.set(depth as i64);
    }
}

/// Count a sandbox run by outcome. No-op if uninitialised.
pub fn record_sandbox_run(success: bool, duration: Duration) {
    if let Some(m) = metrics() {
        let outcome = if success { "success" } else { "failure" };
        m.sandbox_runs.with_label_values(&[outcome]).inc();
        m.sandbox_duration.observe(duration.as_secs_f64());
    }
}

/// Count an improvement action by kind and terminal status. No-op if
/// uninitialised.
pub fn record_improvement_action(kind: &str, status: &str) {
    if let Some(m) = metrics() {
        m.improvement_actions
            .with_label_values(&[kind, status])
            .inc();
    }
}

/// Render all metrics in the Prometheus text exposition format.
///
/// Returns an empty string when metrics were never initialised.
pub fn gather() -> String {
    match metrics() {
        Some(m) => {
            let families = m.registry.gather();
            let mut buf = Vec::new();
            let encoder = TextEncoder::new();
            if encoder.encode(&families, &mut buf).is_err() {
                return String::new();
            }
            String::from_utf8(buf).unwrap_or_default()
        }
        None => String::new(),
    }
}
