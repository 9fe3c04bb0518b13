//! # OptimizingAgent — strategy-ranked artifact optimization
//!
//! Iteratively applies ranked remediation strategies (performance, memory,
//! complexity) to an existing artifact until the measured targets are met
//! or the strategies are exhausted.

use crate::agent::{Agent, AgentRole, Capability};
use crate::artifact::{Artifact, Language};
use crate::task::Task;
use crate::OrchestratorError;
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

/// An optimization strategy, applied in ranked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Remove redundant repeated statements.
    Performance,
    /// Collapse excess blank lines.
    Memory,
    /// Strip trailing whitespace and normalize line endings.
    Complexity,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Performance => "performance",
            Self::Memory => "memory",
            Self::Complexity => "complexity",
        };
        write!(f, "{s}")
    }
}

/// Measured targets the optimizer works toward.
#[derive(Debug, Clone)]
pub struct OptimizationTargets {
    /// Maximum tolerated consecutive duplicate statements.
    pub max_duplicate_runs: usize,
    /// Maximum tolerated consecutive blank lines.
    pub max_consecutive_blanks: usize,
    /// Whether trailing whitespace is tolerated.
    pub allow_trailing_whitespace: bool,
}

impl Default for OptimizationTargets {
    fn default() -> Self {
        Self {
            max_duplicate_runs: 0,
            max_consecutive_blanks: 1,
            allow_trailing_whitespace: false,
        }
    }
}

/// Optimization agent applying ranked strategies.
pub struct OptimizingAgent {
    name: String,
    capabilities: Vec<Capability>,
    strategies: Vec<Strategy>,
    targets: OptimizationTargets,
}

impl OptimizingAgent {
    /// Create an agent covering the given languages with the default
    /// strategy ranking (performance > memory > complexity).
    pub fn new(languages: Vec<Language>) -> Self {
        Self {
            name: "strategy-optimization".to_string(),
            capabilities: vec![Capability::new("code-optimization", languages)],
            strategies: vec![Strategy::Performance, Strategy::Memory, Strategy::Complexity],
            targets: OptimizationTargets::default(),
        }
    }

    /// Override the targets.
    pub fn with_targets(mut self, targets: OptimizationTargets) -> Self {
        self.targets = targets;
        self
    }

    /// Whether the content already meets all targets.
    fn meets_targets(&self, content: &str) -> bool {
        duplicate_runs(content) <= self.targets.max_duplicate_runs
            && max_blank_run(content) <= self.targets.max_consecutive_blanks
            && (self.targets.allow_trailing_whitespace
                || content.lines().all(|l| l.len() == l.trim_end().len()))
    }

    fn apply(strategy: Strategy, content: &str) -> String {
        match strategy {
            Strategy::Performance => {
                let mut out: Vec<&str> = Vec::new();
                for line in content.lines() {
                    if let Some(last) = out.last() {
                        if !line.trim().is_empty() && line.trim() == last.trim() {
                            continue;
                        }
                    }
                    out.push(line);
                }
                rejoin(&out)
            }
            Strategy::Memory => {
                let mut out: Vec<&str> = Vec::new();
                let mut blanks = 0usize;
                for line in content.lines() {
                    if line.trim().is_empty() {
                        blanks += 1;
                        if blanks > 1 {
                            continue;
                        }
                    } else {
                        blanks = 0;
                    }
                    out.push(line);
                }
                rejoin(&out)
            }
            Strategy::Complexity => {
                let trimmed: Vec<String> =
                    content.lines().map(|l| l.trim_end().to_string()).collect();
                let refs: Vec<&str> = trimmed.iter().map(String::as_str).collect();
                rejoin(&refs)
            }
        }
    }
}

/// Count consecutive duplicate non-empty statements.
fn duplicate_runs(content: &str) -> usize {
    let mut runs = 0;
    let mut previous: Option<&str> = None;
    for line in content.lines() {
        if let Some(prev) = previous {
            if !line.trim().is_empty() && line.trim() == prev.trim() {
                runs += 1;
            }
        }
        previous = Some(line);
    }
    runs
}

/// Longest run of consecutive blank lines.
fn max_blank_run(content: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for line in content.lines() {
        if line.trim().is_empty() {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Join lines with a trailing newline.
fn rejoin(lines: &[&str]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    }
}

#[async_trait]
impl Agent for OptimizingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::Optimization
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn execute(
        &self,
        _task: &Task,
        existing: Option<&Artifact>,
    ) -> Result<Artifact, OrchestratorError> {
        let artifact = existing.ok_or_else(|| {
            OrchestratorError::ValidationFailed(
                "optimization agent requires an existing artifact".to_string(),
            )
        })?;

        let mut content = artifact.content.clone();
        let mut applied = Vec::new();

        for strategy in &self.strategies {
            if self.meets_targets(&content) {
                break;
            }
            content = Self::apply(*strategy, &content);
            applied.push(strategy.to_string());
            debug!(strategy = %strategy, "optimization strategy applied");
        }

        let mut optimized = artifact.revised(content);
        optimized
            .metadata
            .insert("optimized_by".to_string(), self.name.clone());
        optimized
            .metadata
            .insert("strategies".to_string(), applied.join(","));
        Ok(optimized)
    }
}
