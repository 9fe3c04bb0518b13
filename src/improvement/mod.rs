//! # Improvement — closed-loop remediation engine
//!
//! ## Responsibility
//! Turn evaluation shortfalls into remediation actions, apply them through
//! a 1:1 kind→handler registry, and record before/after learning
//! experiences.
//!
//! ## Architecture
//!
//! ```text
//! EvaluationResult ──► gap analysis ──► analyzers ──► ImprovementAction(s)
//!                                                          │
//!                      polling loop (5 s) ── pending ──────┤
//!                                                          ▼
//!                                       handler ──► LearningExperience
//! ```
//!
//! ## Modules
//!
//! - [`action`] — ImprovementAction, priorities, status state machine,
//!   LearningExperience
//! - [`analyzers`] — stateless analyzers mapping shortfalls to actions
//! - [`engine`] — the engine: persistence, apply, statistics, polling loop
//!
//! ## Guarantees
//!
//! - Monotonic status: `Completed`/`Failed` are terminal and never revert
//! - One experience per applied action
//! - Handler failures mark the action failed and propagate to the caller
//!
//! ## NOT Responsible For
//! - Deciding when improvement runs (see: center.rs)
//! - Human approval of proposed actions (see: feedback.rs)

pub mod action;
pub mod analyzers;
pub mod engine;

pub use action::{
    ActionKind, ActionPriority, ActionStatus, ImprovementAction, LearningExperience,
};
pub use analyzers::{default_analyzers, Analyzer};
pub use engine::{
    ActionHandler, EngineConfig, ImprovementEngine, ImprovementStatistics, QualityMinimums,
    SimulatedHandler,
};

use thiserror::Error;

/// Errors produced by the improvement engine.
#[derive(Debug, Error)]
pub enum ImprovementError {
    /// No handler is registered for the action's kind.
    #[error("no handler registered for action kind: {0}")]
    MissingHandler(ActionKind),

    /// The referenced action does not exist.
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// The action is already terminal and cannot be applied again.
    #[error("action {id} is already terminal ({status})")]
    ActionTerminal {
        /// The action id.
        id: String,
        /// Its terminal status.
        status: ActionStatus,
    },

    /// A required handler parameter is missing from the action.
    #[error("action {action} missing required parameter: {key}")]
    MissingParameter {
        /// The action id.
        action: String,
        /// The missing parameter key.
        key: String,
    },

    /// The handler's remediation step failed.
    #[error("handler failed: {0}")]
    HandlerFailed(String),
}
