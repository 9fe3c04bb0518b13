//! # Agent — capability-tagged workers
//!
//! ## Responsibility
//! Define the `Agent` trait and the pool that matches tasks to agents by
//! capability, with an injectable tie-break policy.
//!
//! ## Architecture
//!
//! ```text
//! Task ──► AgentPool::select_for ──► eligible agents (can_handle == true)
//!                    │
//!              SelectionPolicy (random | round-robin)
//!                    │
//!                    ▼
//!              Arc<dyn Agent>::execute ──► Artifact
//! ```
//!
//! ## Modules
//!
//! - [`generation`] — template-based generation agent
//! - [`debugging`] — bounded analyze/fix repair agent
//! - [`optimization`] — strategy-ranked optimization agent
//!
//! ## Guarantees
//! - Capability-safe: `select_for` never returns an agent whose
//!   `can_handle` is false for the task
//! - Pluggable: both agents and the selection policy are trait objects
//!
//! ## NOT Responsible For
//! - Task lifecycle (see: store.rs)
//! - Evaluating produced artifacts (see: evaluation.rs)

pub mod debugging;
pub mod generation;
pub mod optimization;

use crate::artifact::{Artifact, Language};
use crate::task::Task;
use crate::OrchestratorError;
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Role an agent plays in the orchestration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    /// Produces a new artifact from task requirements.
    Generation,
    /// Repairs an existing artifact through bounded analyze/fix passes.
    Debugging,
    /// Applies ranked optimization strategies to an existing artifact.
    Optimization,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation => write!(f, "generation"),
            Self::Debugging => write!(f, "debugging"),
            Self::Optimization => write!(f, "optimization"),
        }
    }
}

/// A named capability covering a set of languages.
#[derive(Debug, Clone)]
pub struct Capability {
    /// Capability name (e.g. `"code-synthesis"`).
    pub name: String,
    /// Languages this capability covers.
    pub languages: Vec<Language>,
}

impl Capability {
    /// Create a capability.
    pub fn new(name: impl Into<String>, languages: Vec<Language>) -> Self {
        Self {
            name: name.into(),
            languages,
        }
    }

    /// Whether this capability covers the given language.
    pub fn supports(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }
}

/// A capability-tagged worker that produces, repairs, or optimizes an
/// artifact for a task.
///
/// Implementations must be thread-safe (`Send + Sync`). The trait is
/// object-safe to allow dynamic dispatch via `Arc<dyn Agent>`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// The role this agent plays.
    fn role(&self) -> AgentRole;

    /// Declared capabilities.
    fn capabilities(&self) -> &[Capability];

    /// `true` iff any declared capability lists the task's target language.
    fn can_handle(&self, task: &Task) -> bool {
        self.capabilities()
            .iter()
            .any(|c| c.supports(task.language))
    }

    /// Transform the task into an artifact.
    ///
    /// Generation agents ignore `existing`; repair and optimization agents
    /// require it and produce a new version of it.
    async fn execute(
        &self,
        task: &Task,
        existing: Option<&Artifact>,
    ) -> Result<Artifact, OrchestratorError>;
}

// ─── Selection policy ────────────────────────────────────────────────────────

/// Tie-break policy when several agents can handle a task.
pub trait SelectionPolicy: Send + Sync {
    /// Policy name for logs.
    fn name(&self) -> &str;

    /// Pick an index in `[0, eligible)`. `eligible` is always ≥ 1.
    fn select(&self, eligible: usize) -> usize;
}

/// Uniform random tie-break (the default).
#[derive(Debug, Default)]
pub struct RandomPolicy;

impl SelectionPolicy for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn select(&self, eligible: usize) -> usize {
        if eligible <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..eligible)
    }
}

/// Round-robin tie-break.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    counter: AtomicUsize,
}

impl SelectionPolicy for RoundRobinPolicy {
    fn name(&self) -> &str {
        "round-robin"
    }

    fn select(&self, eligible: usize) -> usize {
        if eligible == 0 {
            return 0;
        }
        self.counter.fetch_add(1, Ordering::Relaxed) % eligible
    }
}

// ─── Pool ────────────────────────────────────────────────────────────────────

struct PoolInner {
    agents: Vec<Arc<dyn Agent>>,
    policy: Arc<dyn SelectionPolicy>,
}

/// Registry of agents with capability-matched selection.
///
/// Clone is cheap (Arc-backed); all clones share the same registry.
#[derive(Clone)]
pub struct AgentPool {
    inner: Arc<RwLock<PoolInner>>,
}

impl Default for AgentPool {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentPool {
    /// Create an empty pool with the random tie-break policy.
    pub fn new() -> Self {
        Self::with_policy(Arc::new(RandomPolicy))
    }

    /// Create an empty pool with a custom tie-break policy.
    pub fn with_policy(policy: Arc<dyn SelectionPolicy>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PoolInner {
                agents: Vec::new(),
                policy,
            })),
        }
    }

    /// Register an agent.
    pub fn register(&self, agent: Arc<dyn Agent>) {
        self.inner.write().agents.push(agent);
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.inner.read().agents.len()
    }

    /// Whether the pool has no agents.
    pub fn is_empty(&self) -> bool {
        self.inner.read().agents.is_empty()
    }

    /// Select an agent that can handle the task, tie-broken by policy.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoCapableAgent`] when no registered
    /// agent's `can_handle` returns true.
    pub fn select_for(&self, task: &Task) -> Result<Arc<dyn Agent>, OrchestratorError> {
        self.select_where(task, |_| true)
    }

    /// Select an agent of a specific role that can handle the task.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoCapableAgent`] when no registered
    /// agent of that role can handle the task.
    pub fn select_role(
        &self,
        task: &Task,
        role: AgentRole,
    ) -> Result<Arc<dyn Agent>, OrchestratorError> {
        self.select_where(task, |a| a.role() == role)
    }

    fn select_where(
        &self,
        task: &Task,
        filter: impl Fn(&dyn Agent) -> bool,
    ) -> Result<Arc<dyn Agent>, OrchestratorError> {
        let inner = self.inner.read();
        let eligible: Vec<&Arc<dyn Agent>> = inner
            .agents
            .iter()
            .filter(|a| filter(a.as_ref()) && a.can_handle(task))
            .collect();
        if eligible.is_empty() {
            return Err(OrchestratorError::NoCapableAgent {
                language: task.language,
            });
        }
        let idx = inner.policy.select(eligible.len()).min(eligible.len() - 1);
        Ok(Arc::clone(eligible[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::generation::TemplateAgent;

    fn pool_with_template(languages: Vec<Language>) -> AgentPool {
        let pool = AgentPool::new();
        pool.register(Arc::new(TemplateAgent::new(languages)));
        pool
    }

    #[test]
    fn test_capability_supports() {
        let cap = Capability::new("synthesis", vec![Language::Python, Language::Rust]);
        assert!(cap.supports(Language::Python));
        assert!(!cap.supports(Language::Go));
    }

    #[test]
    fn test_empty_pool_has_no_capable_agent() {
        let pool = AgentPool::new();
        let task = Task::new("t", "d", Language::Python);
        let err = pool.select_for(&task);
        assert!(matches!(
            err,
            Err(OrchestratorError::NoCapableAgent { .. })
        ));
    }

    #[test]
    fn test_select_for_respects_capability() {
        let pool = pool_with_template(vec![Language::Python]);
        let python_task = Task::new("t", "d", Language::Python);
        let go_task = Task::new("t", "d", Language::Go);
        assert!(pool.select_for(&python_task).is_ok());
        assert!(pool.select_for(&go_task).is_err());
    }

    #[test]
    fn test_selected_agent_always_can_handle() {
        // Property over randomized capability sets: whatever the pool
        // contains, a returned agent can always handle the task.
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let pool = AgentPool::new();
            for _ in 0..4 {
                let langs: Vec<Language> = Language::all()
                    .iter()
                    .copied()
                    .filter(|_| rng.gen_bool(0.5))
                    .collect();
                if !langs.is_empty() {
                    pool.register(Arc::new(TemplateAgent::new(langs)));
                }
            }
            let all = Language::all();
            let task = Task::new("t", "d", all[rng.gen_range(0..all.len())]);
            if let Ok(agent) = pool.select_for(&task) {
                assert!(agent.can_handle(&task));
            }
        }
    }

    #[test]
    fn test_round_robin_policy_cycles() {
        let policy = RoundRobinPolicy::default();
        let picks: Vec<usize> = (0..6).map(|_| policy.select(3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_random_policy_in_range() {
        let policy = RandomPolicy;
        for _ in 0..100 {
            assert!(policy.select(5) < 5);
        }
    }

    #[test]
    fn test_random_policy_single_eligible() {
        assert_eq!(RandomPolicy.select(1), 0);
    }

    #[test]
    fn test_select_role_filters_by_role() {
        let pool = pool_with_template(vec![Language::Python]);
        let task = Task::new("t", "d", Language::Python);
        assert!(pool.select_role(&task, AgentRole::Generation).is_ok());
        assert!(pool.select_role(&task, AgentRole::Debugging).is_err());
    }

    #[test]
    fn test_pool_clone_shares_registry() {
        let pool = AgentPool::new();
        let clone = pool.clone();
        pool.register(Arc::new(TemplateAgent::new(vec![Language::Shell])));
        assert_eq!(clone.len(), 1);
    }

    #[test]
    fn test_pool_len_and_is_empty() {
        let pool = AgentPool::new();
        assert!(pool.is_empty());
        pool.register(Arc::new(TemplateAgent::new(vec![Language::Rust])));
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_agent_role_display() {
        assert_eq!(AgentRole::Generation.to_string(), "generation");
        assert_eq!(AgentRole::Debugging.to_string(), "debugging");
        assert_eq!(AgentRole::Optimization.to_string(), "optimization");
    }
}
