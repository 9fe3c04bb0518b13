//! # SecurityScanner — static denylist scan for artifacts
//!
//! ## Responsibility
//! Scan artifact content line by line against a fixed denylist of dangerous
//! patterns (shell-destructive commands, outbound-network tools, dynamic
//! code execution) plus two broader heuristics, producing advisory issues.
//!
//! ## Guarantees
//! - Deterministic: same content always produces the same issue list
//! - Line-anchored: every issue references its 1-based line number
//! - Advisory: issues are textual only; this is a heuristic scanner, not a
//!   parser, and it is not a containment boundary (see: sandbox.rs)
//!
//! ## NOT Responsible For
//! - Executing artifacts or enforcing resource limits (see: sandbox.rs)
//! - Approval decisions (see: feedback.rs)

use crate::artifact::Artifact;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shell-destructive, outbound-network, and dynamic-execution patterns.
/// Each entry is `(substring, description)`.
const DENYLIST: &[(&str, &str)] = &[
    ("rm -rf", "recursive filesystem deletion"),
    ("mkfs", "filesystem formatting"),
    ("dd if=", "raw device write"),
    (":(){", "fork bomb"),
    ("chmod 777", "world-writable permission change"),
    ("curl ", "outbound network transfer tool"),
    ("wget ", "outbound network download tool"),
    ("netcat", "raw network tool"),
    ("nc -", "raw network tool"),
    ("eval(", "dynamic code evaluation"),
    ("exec(", "dynamic code execution"),
    ("system(", "shell command execution"),
    ("popen", "subprocess invocation"),
    ("subprocess", "subprocess invocation"),
    ("child_process", "subprocess invocation"),
];

/// Tokens that indicate a module import on a line.
const IMPORT_TOKENS: &[&str] = &["import ", "require(", "use std::"];

/// Tokens that indicate OS-level access when combined with an import.
const OS_ACCESS_TOKENS: &[&str] = &["os", "sys", "process", "environ"];

/// A single advisory finding from the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityIssue {
    /// 1-based line number the pattern was found on.
    pub line: usize,
    /// The pattern or heuristic that matched.
    pub pattern: String,
    /// Human-readable description of the concern.
    pub detail: String,
}

impl fmt::Display for SecurityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.pattern, self.detail)
    }
}

/// Result of scanning one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    /// `true` when no issues were found.
    pub is_secure: bool,
    /// All advisory issues, in line order.
    pub issues: Vec<SecurityIssue>,
}

/// Static line-by-line denylist scanner.
#[derive(Debug, Clone, Default)]
pub struct SecurityScanner;

impl SecurityScanner {
    /// Create a scanner with the built-in denylist.
    pub fn new() -> Self {
        Self
    }

    /// Scan an artifact's content and return a report.
    pub fn validate(&self, artifact: &Artifact) -> SecurityReport {
        self.scan(&artifact.content)
    }

    /// Scan raw content and return a report.
    pub fn scan(&self, content: &str) -> SecurityReport {
        let mut issues = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let lower = line.to_lowercase();

            for (pattern, detail) in DENYLIST {
                if lower.contains(pattern) {
                    issues.push(SecurityIssue {
                        line: line_no,
                        pattern: (*pattern).trim().to_string(),
                        detail: (*detail).to_string(),
                    });
                }
            }

            // Heuristic: module import combined with an OS-access token.
            let has_import = IMPORT_TOKENS.iter().any(|t| lower.contains(t));
            if has_import && OS_ACCESS_TOKENS.iter().any(|t| lower.contains(t)) {
                issues.push(SecurityIssue {
                    line: line_no,
                    pattern: "os-access import".to_string(),
                    detail: "module import combined with OS-access token".to_string(),
                });
            }

            // Heuristic: any mention of networking primitives.
            if lower.contains("network") || lower.contains("socket") {
                issues.push(SecurityIssue {
                    line: line_no,
                    pattern: "network/socket".to_string(),
                    detail: "networking primitive referenced".to_string(),
                });
            }
        }

        SecurityReport {
            is_secure: issues.is_empty(),
            issues,
        }
    }
}
