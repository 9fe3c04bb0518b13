//! # OrchestratorConfig — engine configuration
//!
//! ## Responsibility
//! Define configuration for the orchestration engine: approval mode,
//! improvement toggles, sandbox limits, loop timings, and quality minimums.
//!
//! ## Guarantees
//! - Validated: all fields are bounds-checked before use
//! - Defaulted: every field has a sensible default
//! - Serializable: round-trips through serde (TOML ↔ Rust)
//!
//! ## NOT Responsible For
//! - Runtime orchestration (see: center.rs)
//! - Sandbox mechanics (see: sandbox.rs)

use crate::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the orchestration engine.
///
/// # Example
///
/// ```rust
/// use autoforge::config::OrchestratorConfig;
/// let config = OrchestratorConfig::default();
/// assert!(!config.human_in_the_loop);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Require explicit human approval for insecure artifacts and proposed
    /// improvement actions. When `false`, insecure artifacts are
    /// auto-approved — a deliberate but risky default that is logged loudly.
    #[serde(default)]
    pub human_in_the_loop: bool,

    /// Run the improvement engine on terminally failed tasks.
    #[serde(default = "default_true")]
    pub improvement_enabled: bool,

    /// Apply generated improvement actions directly instead of proposing
    /// them through the feedback gate.
    #[serde(default = "default_true")]
    pub auto_apply_improvements: bool,

    /// Allow sandbox execution of artifacts.
    #[serde(default = "default_true")]
    pub sandbox_enabled: bool,

    /// Wall-clock budget for a single sandbox run, in seconds.
    #[serde(default = "default_max_execution_secs")]
    pub max_execution_secs: u64,

    /// Declared memory ceiling for sandboxed processes, in bytes.
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,

    /// Maximum artifact size accepted by the sandbox, in bytes.
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: u64,

    /// Dispatch loop sleep when the queue is empty, in milliseconds.
    #[serde(default = "default_dispatch_idle_ms")]
    pub dispatch_idle_ms: u64,

    /// Dispatch loop backoff after an uncaught error, in milliseconds.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Improvement engine polling interval, in seconds.
    #[serde(default = "default_improvement_poll_secs")]
    pub improvement_poll_secs: u64,

    /// Performance gap below which no improvement actions are generated.
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: f64,

    /// Minimum acceptable complexity score (0.0–1.0).
    #[serde(default = "default_quality_minimum")]
    pub min_complexity_score: f64,

    /// Minimum acceptable readability score (0.0–1.0).
    #[serde(default = "default_quality_minimum")]
    pub min_readability_score: f64,

    /// Minimum acceptable maintainability score (0.0–1.0).
    #[serde(default = "default_quality_minimum")]
    pub min_maintainability_score: f64,

    /// Minimum acceptable test coverage (0.0–1.0).
    #[serde(default = "default_quality_minimum")]
    pub min_test_coverage: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            human_in_the_loop: false,
            improvement_enabled: default_true(),
            auto_apply_improvements: default_true(),
            sandbox_enabled: default_true(),
            max_execution_secs: default_max_execution_secs(),
            max_memory_bytes: default_max_memory_bytes(),
            max_artifact_bytes: default_max_artifact_bytes(),
            dispatch_idle_ms: default_dispatch_idle_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            improvement_poll_secs: default_improvement_poll_secs(),
            gap_threshold: default_gap_threshold(),
            min_complexity_score: default_quality_minimum(),
            min_readability_score: default_quality_minimum(),
            min_maintainability_score: default_quality_minimum(),
            min_test_coverage: default_quality_minimum(),
        }
    }
}

impl OrchestratorConfig {
    /// Validate the configuration, collecting all errors.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidConfig`] with the concatenated
    /// error messages when any field is out of range.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let mut errors = Vec::new();

        if self.max_execution_secs == 0 {
            errors.push("max_execution_secs must be > 0".to_string());
        }
        if self.max_memory_bytes == 0 {
            errors.push("max_memory_bytes must be > 0".to_string());
        }
        if self.max_artifact_bytes == 0 {
            errors.push("max_artifact_bytes must be > 0".to_string());
        }
        if self.dispatch_idle_ms == 0 {
            errors.push("dispatch_idle_ms must be > 0".to_string());
        }
        if self.error_backoff_ms == 0 {
            errors.push("error_backoff_ms must be > 0".to_string());
        }
        if self.improvement_poll_secs == 0 {
            errors.push("improvement_poll_secs must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.gap_threshold) {
            errors.push("gap_threshold must be within [0, 1]".to_string());
        }
        for (name, value) in [
            ("min_complexity_score", self.min_complexity_score),
            ("min_readability_score", self.min_readability_score),
            ("min_maintainability_score", self.min_maintainability_score),
            ("min_test_coverage", self.min_test_coverage),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{name} must be within [0, 1]"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidConfig(errors.join("; ")))
        }
    }

    /// Sandbox execution timeout as a [`Duration`].
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.max_execution_secs)
    }

    /// Dispatch loop idle sleep as a [`Duration`].
    pub fn dispatch_idle(&self) -> Duration {
        Duration::from_millis(self.dispatch_idle_ms)
    }

    /// Dispatch loop error backoff as a [`Duration`].
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Improvement engine polling interval as a [`Duration`].
    pub fn improvement_poll_interval(&self) -> Duration {
        Duration::from_secs(self.improvement_poll_secs)
    }
}

/// Default for boolean toggles that ship enabled.
fn default_true() -> bool {
    true
}

/// Default sandbox execution budget: 30 seconds.
fn default_max_execution_secs() -> u64 {
    30
}

/// Default declared memory ceiling: 256 MiB.
fn default_max_memory_bytes() -> u64 {
    256 * 1024 * 1024
}

/// Default maximum artifact size: 1 MiB.
fn default_max_artifact_bytes() -> u64 {
    1024 * 1024
}

/// Default dispatch idle sleep: 100 ms.
fn default_dispatch_idle_ms() -> u64 {
    100
}

/// Default dispatch error backoff: 1000 ms.
fn default_error_backoff_ms() -> u64 {
    1000
}

/// Default improvement polling interval: 5 seconds.
fn default_improvement_poll_secs() -> u64 {
    5
}

/// Default performance gap threshold: 0.05.
fn default_gap_threshold() -> f64 {
    0.05
}

/// Default quality minimum: 0.7.
fn default_quality_minimum() -> f64 {
    0.7
}
