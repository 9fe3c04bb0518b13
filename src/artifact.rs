//! # Artifact — agent output and execution outcome types
//!
//! ## Responsibility
//! Define the Artifact produced by agents, the Language it is written in,
//! and the ExecutionResult returned by a sandbox run.
//!
//! ## Guarantees
//! - Serializable: round-trips through serde (JSON ↔ Rust)
//! - Versioned: revisions keep the artifact id and bump `modified_at`
//! - Non-panicking: all operations return plain values or `Result`
//!
//! ## NOT Responsible For
//! - Producing artifacts (see: agent module)
//! - Executing artifacts (see: sandbox.rs)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Programming language of a task target or artifact.
///
/// The split between interpreted and compiled languages drives the sandbox:
/// compiled languages get a build step before execution, interpreted ones
/// are handed straight to their runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Python 3 source, executed via `python3`.
    Python,
    /// JavaScript source, executed via `node`.
    JavaScript,
    /// Rust source, built with `rustc` before execution.
    Rust,
    /// Go source, built with `go build` before execution.
    Go,
    /// POSIX shell script, executed via `sh`.
    Shell,
}

impl Language {
    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Shell => "shell",
        }
    }

    /// File extension used when writing the artifact to disk.
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::JavaScript => "js",
            Self::Rust => "rs",
            Self::Go => "go",
            Self::Shell => "sh",
        }
    }

    /// Whether this language requires a build step before execution.
    pub fn is_compiled(self) -> bool {
        matches!(self, Self::Rust | Self::Go)
    }

    /// The line-comment prefix for this language.
    pub fn comment_prefix(self) -> &'static str {
        match self {
            Self::Python | Self::Shell => "#",
            Self::JavaScript | Self::Rust | Self::Go => "//",
        }
    }

    /// All supported languages.
    pub fn all() -> &'static [Language] {
        &[
            Self::Python,
            Self::JavaScript,
            Self::Rust,
            Self::Go,
            Self::Shell,
        ]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A code artifact produced by an agent.
///
/// Repair and optimization agents produce new versions of an existing
/// artifact: same `id`, updated `content`/`metadata`, bumped `modified_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique artifact identifier (UUID), stable across revisions.
    pub id: String,
    /// Relative path the artifact should be written to (e.g. `solution.py`).
    pub path: String,
    /// Full source content.
    pub content: String,
    /// Language the content is written in.
    pub language: Language,
    /// Unix timestamp (seconds) when the artifact was first created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the most recent revision.
    pub modified_at: u64,
    /// Free-form metadata (producing agent, repair attempts, etc.).
    pub metadata: HashMap<String, String>,
}

impl Artifact {
    /// Create a new artifact with a fresh UUID.
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        language: Language,
    ) -> Self {
        let now = unix_now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.into(),
            content: content.into(),
            language,
            created_at: now,
            modified_at: now,
            metadata: HashMap::new(),
        }
    }

    /// Produce a revised version: same id, new content, bumped `modified_at`.
    pub fn revised(&self, content: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.content = content.into();
        next.modified_at = unix_now().max(self.modified_at);
        next
    }

    /// Size of the content in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    /// Number of lines in the content.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Outcome of running an artifact inside the sandbox.
///
/// Created once per sandbox run and not persisted beyond the call that
/// requested it.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether the process exited successfully within the time budget.
    pub success: bool,
    /// Captured stdout.
    pub output: String,
    /// Error descriptions: captured stderr, build failures, timeout notices.
    pub errors: Vec<String>,
    /// Wall-clock execution time.
    pub execution_time: Duration,
    /// Peak memory usage in bytes. Best-effort: 0 when the platform does
    /// not expose a cheap measurement.
    pub memory_usage: u64,
    /// Process exit code (-1 when the process was killed or never exited).
    pub exit_code: i32,
}

/// Current Unix timestamp in seconds.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
