//! # autoforge
//!
//! An autonomous coding-task orchestration engine over Tokio.
//!
//! ## Architecture
//!
//! ```text
//! submit ──► TaskStore (FIFO) ──► dispatch loop ──► Agent (capability match)
//!                                      │
//!                              SecurityScanner ──► FeedbackGate (approval)
//!                                      │
//!                              Sandbox (isolated run, watchdog)
//!                                      │
//!                           EvaluationPipeline (merge verdicts)
//!                                      │
//!                 pass: complete   fail: one repair pass ──► ImprovementEngine
//! ```
//!
//! Three independent concurrent loops: the dispatch loop, the
//! improvement-engine polling loop, and per-session sandbox watchdogs.
//! Each component serializes its own state; concurrency crosses only at
//! component-call boundaries.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod agent;
pub mod artifact;
pub mod center;
pub mod config;
pub mod evaluation;
pub mod feedback;
pub mod improvement;
pub mod metrics;
pub mod sandbox;
pub mod security;
pub mod store;
pub mod task;

// Re-exports for convenience
pub use artifact::{Artifact, ExecutionResult, Language};
pub use center::{CommandCenter, SystemMetrics};
pub use config::OrchestratorConfig;
pub use store::TaskOutcome;
pub use task::{Difficulty, Task, TaskStatus};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///   for local development
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`OrchestratorError::ValidationFailed`] if the global subscriber
/// has already been set (e.g. by a previous call or a test harness).
pub fn init_tracing() -> Result<(), OrchestratorError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| OrchestratorError::ValidationFailed(format!("tracing init failed: {e}")))
}

/// Top-level orchestrator errors.
///
/// Every error surface in the engine is mapped to a variant here.
/// All variants implement `std::error::Error` via [`thiserror`].
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// No registered agent can handle the task's target language.
    #[error("no capable agent for language: {language}")]
    NoCapableAgent {
        /// The unhandled target language.
        language: Language,
    },

    /// Referenced task id is unknown.
    #[error("task not found: {id}")]
    TaskNotFound {
        /// The task id that was not found.
        id: String,
    },

    /// An artifact was rejected by the security gate.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A sandboxed operation exceeded its time budget.
    #[error("timed out after {secs}s")]
    Timeout {
        /// The budget that was exceeded, in seconds.
        secs: u64,
    },

    /// An artifact or pipeline precondition failed.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// An artifact build or run exited with failure.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A task-store operation failed.
    #[error(transparent)]
    Store(#[from] store::StoreError),

    /// A sandbox operation failed.
    #[error(transparent)]
    Sandbox(#[from] sandbox::SandboxError),

    /// An improvement-engine operation failed.
    #[error(transparent)]
    Improvement(#[from] improvement::ImprovementError),

    /// A feedback-gate operation failed.
    #[error(transparent)]
    Gate(#[from] feedback::GateError),

    /// A configuration value is out of range.
    ///
    /// Returned at construction time so misconfiguration surfaces
    /// immediately rather than at the first dispatched task.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_no_capable_agent() {
        let err = OrchestratorError::NoCapableAgent {
            language: Language::Go,
        };
        assert!(err.to_string().contains("go"));
    }

    #[test]
    fn test_error_display_task_not_found() {
        let err = OrchestratorError::TaskNotFound {
            id: "task-9".to_string(),
        };
        assert!(err.to_string().contains("task-9"));
    }

    #[test]
    fn test_error_display_permission_denied() {
        let err = OrchestratorError::PermissionDenied("3 issues".to_string());
        assert!(err.to_string().contains("3 issues"));
    }

    #[test]
    fn test_error_display_timeout() {
        let err = OrchestratorError::Timeout { secs: 30 };
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_error_from_sandbox_error() {
        let err: OrchestratorError = sandbox::SandboxError::Disabled.into();
        assert!(matches!(err, OrchestratorError::Sandbox(_)));
    }

    #[test]
    fn test_error_from_store_error() {
        let err: OrchestratorError = store::StoreError::TaskNotFound {
            id: "x".to_string(),
        }
        .into();
        assert!(matches!(err, OrchestratorError::Store(_)));
    }

    #[test]
    fn test_error_from_improvement_error() {
        let err: OrchestratorError =
            improvement::ImprovementError::ActionNotFound("a".to_string()).into();
        assert!(matches!(err, OrchestratorError::Improvement(_)));
    }

    #[test]
    fn test_error_display_invalid_config() {
        let err = OrchestratorError::InvalidConfig("gap_threshold out of range".to_string());
        assert!(err.to_string().contains("gap_threshold"));
    }
}
