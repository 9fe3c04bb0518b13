//! # DebugAgent — bounded analyze/fix repair loop
//!
//! Iteratively repairs an existing artifact: each attempt statically
//! analyzes the content for issues, stops early when none remain, and
//! otherwise applies one fix per issue category, ranked by descending
//! severity. The loop is bounded at three attempts.

use crate::agent::{Agent, AgentRole, Capability};
use crate::artifact::{Artifact, Language};
use crate::task::Task;
use crate::OrchestratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Category of a detected code issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// Unbalanced delimiters and similar structural breakage.
    Syntax,
    /// Unfinished logic (TODO/FIXME/unimplemented markers).
    Logic,
    /// Redundant repeated work.
    Performance,
    /// Dynamic code execution left in the artifact.
    Security,
    /// Formatting problems.
    Style,
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Syntax => "syntax",
            Self::Logic => "logic",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::Style => "style",
        };
        write!(f, "{s}")
    }
}

/// Severity of a detected issue, ordered ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Cosmetic.
    Low,
    /// Worth fixing.
    Medium,
    /// Likely incorrect behavior.
    High,
    /// Broken or dangerous.
    Critical,
}

/// A single issue found by static analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeIssue {
    /// Issue category; drives which fix is applied.
    pub category: IssueCategory,
    /// Severity; drives fix ordering.
    pub severity: IssueSeverity,
    /// 1-based line number (0 for whole-file issues).
    pub line: usize,
    /// Human-readable description.
    pub message: String,
}

/// Repair agent with a bounded analyze/fix loop.
pub struct DebugAgent {
    name: String,
    capabilities: Vec<Capability>,
    max_attempts: usize,
}

impl DebugAgent {
    /// Create an agent covering the given languages, bounded at 3 attempts.
    pub fn new(languages: Vec<Language>) -> Self {
        Self {
            name: "static-debugging".to_string(),
            capabilities: vec![Capability::new("code-repair", languages)],
            max_attempts: 3,
        }
    }

    /// Statically analyze content for issues across all categories.
    pub fn analyze(content: &str) -> Vec<CodeIssue> {
        let mut issues = Vec::new();

        // Syntax: unbalanced delimiters over the whole file.
        for (open, close) in [('(', ')'), ('{', '}'), ('[', ']')] {
            let opens = content.matches(open).count();
            let closes = content.matches(close).count();
            if opens != closes {
                issues.push(CodeIssue {
                    category: IssueCategory::Syntax,
                    severity: IssueSeverity::Critical,
                    line: 0,
                    message: format!(
                        "unbalanced delimiters: {opens} '{open}' vs {closes} '{close}'"
                    ),
                });
            }
        }

        let mut previous: Option<&str> = None;
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;

            if line.contains("TODO") || line.contains("FIXME") || line.contains("unimplemented") {
                issues.push(CodeIssue {
                    category: IssueCategory::Logic,
                    severity: IssueSeverity::High,
                    line: line_no,
                    message: "unfinished logic marker".to_string(),
                });
            }

            if line.contains("eval(") || line.contains("exec(") || line.contains("system(") {
                issues.push(CodeIssue {
                    category: IssueCategory::Security,
                    severity: IssueSeverity::High,
                    line: line_no,
                    message: "dynamic code execution".to_string(),
                });
            }

            if let Some(prev) = previous {
                if !line.trim().is_empty() && line.trim() == prev.trim() {
                    issues.push(CodeIssue {
                        category: IssueCategory::Performance,
                        severity: IssueSeverity::Medium,
                        line: line_no,
                        message: "consecutive duplicated statement".to_string(),
                    });
                }
            }

            if line.len() != line.trim_end().len() {
                issues.push(CodeIssue {
                    category: IssueCategory::Style,
                    severity: IssueSeverity::Low,
                    line: line_no,
                    message: "trailing whitespace".to_string(),
                });
            }

            previous = Some(line);
        }

        issues
    }

    /// Apply the fix for one issue category, returning the new content.
    fn apply_fix(content: &str, category: IssueCategory) -> String {
        match category {
            IssueCategory::Syntax => {
                let mut fixed = content.to_string();
                let mut suffix = String::new();
                for (open, close) in [('(', ')'), ('{', '}'), ('[', ']')] {
                    let opens = fixed.matches(open).count();
                    let closes = fixed.matches(close).count();
                    if opens > closes {
                        // Append the missing closers.
                        for _ in closes..opens {
                            suffix.push(close);
                        }
                    } else if closes > opens {
                        // Drop the stranded closers, last occurrences first.
                        let mut excess = closes - opens;
                        let reversed: String = fixed
                            .chars()
                            .rev()
                            .filter(|c| {
                                if *c == close && excess > 0 {
                                    excess -= 1;
                                    false
                                } else {
                                    true
                                }
                            })
                            .collect();
                        fixed = reversed.chars().rev().collect();
                    }
                }
                if !suffix.is_empty() {
                    if !fixed.ends_with('\n') {
                        fixed.push('\n');
                    }
                    fixed.push_str(&suffix);
                }
                if !fixed.ends_with('\n') {
                    fixed.push('\n');
                }
                fixed
            }
            IssueCategory::Logic => lines_filtered(content, |line| {
                !(line.contains("TODO")
                    || line.contains("FIXME")
                    || line.contains("unimplemented"))
            }),
            IssueCategory::Security => lines_filtered(content, |line| {
                !(line.contains("eval(") || line.contains("exec(") || line.contains("system("))
            }),
            IssueCategory::Performance => {
                let mut out: Vec<&str> = Vec::new();
                for line in content.lines() {
                    if let Some(last) = out.last() {
                        if !line.trim().is_empty() && line.trim() == last.trim() {
                            continue;
                        }
                    }
                    out.push(line);
                }
                join_lines(&out)
            }
            IssueCategory::Style => {
                let trimmed: Vec<String> =
                    content.lines().map(|l| l.trim_end().to_string()).collect();
                let refs: Vec<&str> = trimmed.iter().map(String::as_str).collect();
                join_lines(&refs)
            }
        }
    }
}

/// Keep only lines matching the predicate, preserving the trailing newline.
fn lines_filtered(content: &str, keep: impl Fn(&str) -> bool) -> String {
    let kept: Vec<&str> = content.lines().filter(|l| keep(l)).collect();
    join_lines(&kept)
}

/// Join lines with a trailing newline.
fn join_lines(lines: &[&str]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    }
}

#[async_trait]
impl Agent for DebugAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::Debugging
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
                "debugging agent requires an existing artifact".to_string(),
            )
        })?;

        let mut content = artifact.content.clone();
        let mut attempts = 0usize;

        for attempt in 1..=self.max_attempts {
            let mut issues = Self::analyze(&content);
            if issues.is_empty() {
                break;
            }
            attempts = attempt;
            // Rank remaining issues by descending severity, then apply one
            // fix per category present.
            issues.sort_by(|a, b| b.severity.cmp(&a.severity));
            debug!(attempt, issues = issues.len(), "debug pass");
            let mut fixed_categories = Vec::new();
            for issue in &issues {
                if fixed_categories.contains(&issue.category) {
                    continue;
                }
                content = Self::apply_fix(&content, issue.category);
                fixed_categories.push(issue.category);
            }
        }

        let mut repaired = artifact.revised(content);
        repaired
            .metadata
            .insert("repaired_by".to_string(), self.name.clone());
        repaired
            .metadata
            .insert("repair_attempts".to_string(), attempts.to_string());
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> DebugAgent {
        DebugAgent::new(vec![Language::Python])
    }

    fn task() -> Task {
        Task::new("t", "d", Language::Python)
    }

    fn artifact(content: &str) -> Artifact {
        Artifact::new("a.py", content, Language::Python)
    }

    #[test]
    fn test_analyze_clean_content_no_issues() {
        let issues = DebugAgent::analyze("def f():\n    return 1\n");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_analyze_detects_unbalanced_delimiters() {
        let issues = DebugAgent::analyze("def f(:\n    return [1, 2\n");
        assert!(issues
            .iter()
            .any(|i| i.category == IssueCategory::Syntax
                && i.severity == IssueSeverity::Critical));
    }

    #[test]
    fn test_analyze_detects_todo_markers() {
        let issues = DebugAgent::analyze("def f():\n    # TODO finish\n    return 1\n");
        assert!(issues.iter().any(|i| i.category == IssueCategory::Logic));
    }

    #[test]
    fn test_analyze_detects_eval() {
        let issues = DebugAgent::analyze("eval(data)\n");
        assert!(issues.iter().any(|i| i.category == IssueCategory::Security));
    }

    #[test]
    fn test_analyze_detects_duplicate_lines() {
        let issues = DebugAgent::analyze("x = compute()\nx = compute()\n");
        assert!(issues
            .iter()
            .any(|i| i.category == IssueCategory::Performance));
    }

    #[test]
    fn test_analyze_detects_trailing_whitespace() {
        let issues = DebugAgent::analyze("x = 1   \n");
        assert!(issues.iter().any(|i| i.category == IssueCategory::Style));
    }

    #[test]
    fn test_analyze_reports_line_numbers() {
        let issues = DebugAgent::analyze("ok = 1\n# TODO later\n");
        let logic = issues
            .iter()
            .find(|i| i.category == IssueCategory::Logic)
            .unwrap();
        assert_eq!(logic.line, 2);
    }

    #[tokio::test]
    async fn test_execute_requires_existing_artifact() {
        let result = agent().execute(&task(), None).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_removes_todo_lines() {
        let input = artifact("def f():\n    # TODO finish this\n    return 1\n");
        let repaired = agent().execute(&task(), Some(&input)).await.unwrap();
        assert!(!repaired.content.contains("TODO"));
        assert!(repaired.content.contains("return 1"));
    }

    #[tokio::test]
    async fn test_execute_balances_delimiters() {
        let input = artifact("items = [1, 2, 3\n");
        let repaired = agent().execute(&task(), Some(&input)).await.unwrap();
        assert!(DebugAgent::analyze(&repaired.content)
            .iter()
            .all(|i| i.category != IssueCategory::Syntax));
    }

    #[tokio::test]
    async fn test_execute_strips_trailing_whitespace() {
        let input = artifact("x = 1   \ny = 2\n");
        let repaired = agent().execute(&task(), Some(&input)).await.unwrap();
        assert!(repaired.content.lines().all(|l| l.trim_end() == l));
    }

    #[tokio::test]
    async fn test_execute_dedups_consecutive_duplicates() {
        let input = artifact("total = add()\ntotal = add()\nprint(total)\n");
        let repaired = agent().execute(&task(), Some(&input)).await.unwrap();
        assert_eq!(
            repaired.content.matches("total = add()").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_execute_keeps_artifact_id() {
        let input = artifact("# TODO\nx = 1\n");
        let repaired = agent().execute(&task(), Some(&input)).await.unwrap();
        assert_eq!(repaired.id, input.id);
        assert_eq!(
            repaired.metadata.get("repaired_by").map(String::as_str),
            Some("static-debugging")
        );
    }

    #[tokio::test]
    async fn test_execute_clean_artifact_zero_attempts() {
        let input = artifact("def f():\n    return 1\n");
        let repaired = agent().execute(&task(), Some(&input)).await.unwrap();
        assert_eq!(
            repaired.metadata.get("repair_attempts").map(String::as_str),
            Some("0")
        );
    }

    #[tokio::test]
    async fn test_execute_converges_on_multi_issue_artifact() {
        let input = artifact("# TODO cleanup   \neval(data)\nx = [1, 2\nx = [1, 2\n");
        let repaired = agent().execute(&task(), Some(&input)).await.unwrap();
        let remaining = DebugAgent::analyze(&repaired.content);
        assert!(
            remaining.is_empty(),
            "issues remain after repair: {remaining:?}"
        );
    }

    #[test]
    fn test_issue_severity_ordering() {
        assert!(IssueSeverity::Critical > IssueSeverity::High);
        assert!(IssueSeverity::High > IssueSeverity::Medium);
        assert!(IssueSeverity::Medium > IssueSeverity::Low);
    }

    #[test]
    fn test_issue_category_display() {
        assert_eq!(IssueCategory::Syntax.to_string(), "syntax");
        assert_eq!(IssueCategory::Performance.to_string(), "performance");
    }
}
