//! # Sandbox — isolated, resource-limited artifact execution
//!
//! ## Responsibility
//! Execute an artifact inside an ephemeral, exclusively-owned working
//! directory: write the source, build it when the language is compiled,
//! run it with optional piped input, capture output, and enforce the
//! wall-clock watchdog.
//!
//! ## Guarantees
//! - Isolated: each run gets its own session directory, never shared
//! - Torn down: the session directory is removed on every exit path
//!   (success, failure, timeout, or error) via `TempDir` ownership
//! - Bounded: processes are killed once `max_execution_time` elapses
//!
//! ## Enforcement note
//! Of the declared [`ResourceLimits`], the wall-clock watchdog and the
//! artifact-size cap are actively enforced in-process. Memory, process
//! count, and network containment are declared policy; backing them with
//! OS isolation primitives (namespaces/cgroups, seccomp, or a container
//! boundary) is the integration point for hardened deployments. The
//! denylist scan in security.rs is not a containment boundary.
//!
//! ## NOT Responsible For
//! - Deciding whether an artifact is safe to run (see: security.rs)
//! - Judging output quality (see: evaluation.rs)

use crate::artifact::{Artifact, ExecutionResult, Language};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors produced by the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Execution was requested while sandboxing is disabled.
    #[error("sandbox is disabled")]
    Disabled,

    /// The artifact exceeds the configured size limit.
    #[error("artifact too large: {size} bytes (limit {limit})")]
    ArtifactTooLarge {
        /// Actual artifact size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },

    /// The build or runtime process could not be spawned.
    #[error("process spawn failed: {0}")]
    Spawn(String),

    /// Session directory setup or file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Declared resource policy for sandboxed execution.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Declared memory ceiling in bytes (not enforced in-process).
    pub max_memory_bytes: u64,
    /// Wall-clock budget per run; enforced by the watchdog.
    pub max_execution_time: Duration,
    /// Maximum artifact size in bytes; enforced before the run.
    pub max_file_size_bytes: u64,
    /// Declared process cap (not enforced in-process).
    pub max_processes: u32,
    /// Declared network-connection cap (not enforced in-process).
    pub max_network_connections: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 256 * 1024 * 1024,
            max_execution_time: Duration::from_secs(30),
            max_file_size_bytes: 1024 * 1024,
            max_processes: 1,
            max_network_connections: 0,
        }
    }
}

/// Isolated execution environment for artifacts.
pub struct Sandbox {
    enabled: bool,
    limits: ResourceLimits,
    /// Path of the most recent session directory, kept for diagnostics
    /// (the directory itself is removed when the run finishes).
    last_session: Mutex<Option<PathBuf>>,
}

impl Sandbox {
    /// Create a sandbox.
    pub fn new(enabled: bool, limits: ResourceLimits) -> Self {
        Self {
            enabled,
            limits,
            last_session: Mutex::new(None),
        }
    }

    /// Whether execution is permitted.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The configured resource limits.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Path of the most recent session directory (already removed).
    pub fn last_session_path(&self) -> Option<PathBuf> {
        self.last_session.lock().clone()
    }

    /// Execute an artifact with optional piped stdin.
    ///
    /// Compiled languages get a build step first; a build failure is a hard
    /// execution failure (`success == false`). A run exceeding
    /// `max_execution_time` is force-terminated and reported with
    /// `success == false`. The session directory is deleted on every exit
    /// path, including errors, because the `TempDir` owns it.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::Disabled`] when sandboxing is off
    /// - [`SandboxError::ArtifactTooLarge`] when the content exceeds the cap
    /// - [`SandboxError::Spawn`] when a toolchain binary is unavailable
    /// - [`SandboxError::Io`] on session setup failure
    pub async fn execute(
        &self,
        artifact: &Artifact,
        input: Option<&str>,
    ) -> Result<ExecutionResult, SandboxError> {
        if !self.enabled {
            return Err(SandboxError::Disabled);
        }
        if artifact.size_bytes() > self.limits.max_file_size_bytes {
            return Err(SandboxError::ArtifactTooLarge {
                size: artifact.size_bytes(),
                limit: self.limits.max_file_size_bytes,
            });
        }

        let session = tempfile::TempDir::new()?;
        *self.last_session.lock() = Some(session.path().to_path_buf());
        debug!(path = %session.path().display(), language = %artifact.language, "sandbox session opened");

        let start = Instant::now();
        let source = session
            .path()
            .join(format!("artifact.{}", artifact.language.file_extension()));
        tokio::fs::write(&source, &artifact.content).await?;

        let binary = session.path().join("artifact_bin");

        // Build step for compiled languages; failure ends the run.
        if artifact.language.is_compiled() {
            if let Some(result) = self
                .build(artifact.language, &source, &binary, start)
                .await?
            {
                // Build failed — the session closes via TempDir drop.
                let _ = session.close();
                return Ok(result);
            }
        }

        let (program, args) = run_command(artifact.language, &source, &binary);
        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(session.path())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| SandboxError::Spawn(format!("failed to spawn {program}: {e}")))?;

        if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
            let _ = stdin.write_all(text.as_bytes()).await;
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let remaining = self
            .limits
            .max_execution_time
            .saturating_sub(start.elapsed());

        let result = match tokio::time::timeout(remaining, child.wait()).await {
            Ok(Ok(exit_status)) => {
                let stdout = read_to_string(stdout_handle).await;
                let stderr = read_to_string(stderr_handle).await;
                let mut errors = Vec::new();
                if !stderr.trim().is_empty() {
                    errors.push(stderr.trim().to_string());
                }
                ExecutionResult {
                    success: exit_status.success(),
                    output: stdout,
                    errors,
                    execution_time: start.elapsed(),
                    memory_usage: 0,
                    exit_code: exit_status.code().unwrap_or(-1),
                }
            }
            Ok(Err(e)) => {
                let _ = session.close();
                return Err(SandboxError::Spawn(format!("process wait failed: {e}")));
            }
            Err(_) => {
                // Watchdog fired — force-terminate the process.
                let _ = child.kill().await;
                warn!(
                    timeout_secs = self.limits.max_execution_time.as_secs(),
                    "sandbox watchdog killed process"
                );
                ExecutionResult {
                    success: false,
                    output: String::new(),
                    errors: vec![format!(
                        "execution timed out after {}s",
                        self.limits.max_execution_time.as_secs()
                    )],
                    execution_time: start.elapsed(),
                    memory_usage: 0,
                    exit_code: -1,
                }
            }
        };

        debug!(
            success = result.success,
            elapsed_ms = result.execution_time.as_millis() as u64,
            "sandbox session finished"
        );
        // Explicit teardown surfaces removal errors; Drop covers all other paths.
        session.close()?;
        Ok(result)
    }

    /// Run the build step for a compiled language.
    ///
    /// Returns `Ok(Some(result))` when the build failed (hard execution
    /// failure) and `Ok(None)` when the binary is ready.
    async fn build(
        &self,
        language: Language,
        source: &Path,
        binary: &Path,
        start: Instant,
    ) -> Result<Option<ExecutionResult>, SandboxError> {
        let (program, args) = build_command(language, source, binary);
        let output = match tokio::time::timeout(
            self.limits.max_execution_time,
            Command::new(program).args(&args).output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SandboxError::Spawn(format!(
                    "failed to spawn {program}: {e}"
                )))
            }
            Err(_) => {
                return Ok(Some(ExecutionResult {
                    success: false,
                    output: String::new(),
                    errors: vec![format!(
                        "build timed out after {}s",
                        self.limits.max_execution_time.as_secs()
                    )],
                    execution_time: start.elapsed(),
                    memory_usage: 0,
                    exit_code: -1,
                }))
            }
        };

        if output.status.success() {
            return Ok(None);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(Some(ExecutionResult {
            success: false,
            output: String::from_utf8_lossy(&output.stdout).to_string(),
            errors: vec![format!("build failed: {}", stderr.trim())],
            execution_time: start.elapsed(),
            memory_usage: 0,
            exit_code: output.status.code().unwrap_or(-1),
        }))
    }
}

/// Runtime invocation for an artifact: `(program, args)`.
fn run_command(language: Language, source: &Path, binary: &Path) -> (String, Vec<String>) {
    let source = source.display().to_string();
    match language {
        Language::Python => ("python3".to_string(), vec![source]),
        Language::JavaScript => ("node".to_string(), vec![source]),
        Language::Shell => ("sh".to_string(), vec![source]),
        // Compiled languages run the binary produced by the build step.
        Language::Rust | Language::Go => (binary.display().to_string(), vec![]),
    }
}

/// Build invocation for a compiled language: `(program, args)`.
fn build_command(language: Language, source: &Path, binary: &Path) -> (&'static str, Vec<String>) {
    let source = source.display().to_string();
    let binary = binary.display().to_string();
    match language {
        Language::Rust => ("rustc", vec![source, "-o".to_string(), binary]),
        Language::Go => (
            "go",
            vec!["build".to_string(), "-o".to_string(), binary, source],
        ),
        // Interpreted languages never reach the build step.
        _ => ("true", vec![]),
    }
}

/// Drain an optional child pipe to a lossy string.
async fn read_to_string<R: AsyncReadExt + Unpin>(handle: Option<R>) -> String {
    match handle {
        Some(mut reader) => {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_with_timeout(secs: u64) -> Sandbox {
        Sandbox::new(
            true,
            ResourceLimits {
                max_execution_time: Duration::from_secs(secs),
                ..ResourceLimits::default()
            },
        )
    }

    fn shell_artifact(content: &str) -> Artifact {
        Artifact::new("script.sh", content, Language::Shell)
    }

    #[test]
    fn test_resource_limits_defaults() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_processes, 1);
        assert_eq!(limits.max_network_connections, 0);
        assert_eq!(limits.max_execution_time, Duration::from_secs(30));
        assert_eq!(limits.max_file_size_bytes, 1024 * 1024);
    }

    #[tokio::test]
    async fn test_disabled_sandbox_rejects_execution() {
        let sandbox = Sandbox::new(false, ResourceLimits::default());
        let result = sandbox.execute(&shell_artifact("echo hi"), None).await;
        assert!(matches!(result, Err(SandboxError::Disabled)));
    }

    #[tokio::test]
    async fn test_oversized_artifact_rejected() {
        let sandbox = Sandbox::new(
            true,
            ResourceLimits {
                max_file_size_bytes: 8,
                ..ResourceLimits::default()
            },
        );
        let result = sandbox
            .execute(&shell_artifact("echo this is too long"), None)
            .await;
        assert!(matches!(
            result,
            Err(SandboxError::ArtifactTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_shell_echo_captures_output() {
        let sandbox = sandbox_with_timeout(10);
        match sandbox.execute(&shell_artifact("echo sandboxed"), None).await {
            Ok(result) => {
                assert!(result.success);
                assert!(result.output.contains("sandboxed"));
                assert_eq!(result.exit_code, 0);
            }
            // sh may be unavailable on exotic platforms; spawn failure is
            // the only acceptable alternative.
            Err(SandboxError::Spawn(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_failure() {
        let sandbox = sandbox_with_timeout(10);
        match sandbox.execute(&shell_artifact("exit 3"), None).await {
            Ok(result) => {
                assert!(!result.success);
                assert_eq!(result.exit_code, 3);
            }
            Err(SandboxError::Spawn(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_stderr_is_collected_as_error() {
        let sandbox = sandbox_with_timeout(10);
        match sandbox
            .execute(&shell_artifact("echo oops >&2; exit 1"), None)
            .await
        {
            Ok(result) => {
                assert!(!result.success);
                assert!(result.errors.iter().any(|e| e.contains("oops")));
            }
            Err(SandboxError::Spawn(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_piped_input_reaches_process() {
        let sandbox = sandbox_with_timeout(10);
        match sandbox.execute(&shell_artifact("cat"), Some("piped-line")).await {
            Ok(result) => {
                assert!(result.output.contains("piped-line"));
            }
            Err(SandboxError::Spawn(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_watchdog_kills_runaway_process() {
        let sandbox = sandbox_with_timeout(1);
        match sandbox.execute(&shell_artifact("sleep 30"), None).await {
            Ok(result) => {
                assert!(!result.success);
                assert_eq!(result.exit_code, -1);
                assert!(result.errors.iter().any(|e| e.contains("timed out")));
            }
            Err(SandboxError::Spawn(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_session_directory_removed_after_success() {
        let sandbox = sandbox_with_timeout(10);
        let _ = sandbox.execute(&shell_artifact("echo done"), None).await;
        if let Some(path) = sandbox.last_session_path() {
            assert!(!path.exists(), "session dir {} survived", path.display());
        }
    }

    #[tokio::test]
    async fn test_session_directory_removed_after_timeout() {
        let sandbox = sandbox_with_timeout(1);
        let _ = sandbox.execute(&shell_artifact("sleep 30"), None).await;
        if let Some(path) = sandbox.last_session_path() {
            assert!(!path.exists(), "session dir {} survived", path.display());
        }
    }

    #[tokio::test]
    async fn test_session_directory_removed_after_spawn_error() {
        let sandbox = Sandbox::new(true, ResourceLimits::default());
        let artifact = Artifact::new("x.py", "print('hi')", Language::Python);
        // Even if python3 is missing the session must not leak.
        let _ = sandbox.execute(&artifact, None).await;
        if let Some(path) = sandbox.last_session_path() {
            assert!(!path.exists(), "session dir {} survived", path.display());
        }
    }

    #[tokio::test]
    async fn test_memory_usage_is_best_effort_zero() {
        let sandbox = sandbox_with_timeout(10);
        if let Ok(result) = sandbox.execute(&shell_artifact("echo hi"), None).await {
            assert_eq!(result.memory_usage, 0);
        }
    }

    #[test]
    fn test_build_command_rust() {
        let (program, args) = build_command(
            Language::Rust,
            Path::new("/tmp/s/artifact.rs"),
            Path::new("/tmp/s/artifact_bin"),
        );
        assert_eq!(program, "rustc");
        assert!(args.iter().any(|a| a.contains("artifact.rs")));
        assert!(args.iter().any(|a| a.contains("artifact_bin")));
    }

    #[test]
    fn test_build_command_go() {
        let (program, args) = build_command(
            Language::Go,
            Path::new("/tmp/s/artifact.go"),
            Path::new("/tmp/s/artifact_bin"),
        );
        assert_eq!(program, "go");
        assert_eq!(args[0], "build");
    }

    #[test]
    fn test_run_command_interpreted() {
        let (program, args) = run_command(
            Language::Python,
            Path::new("/tmp/s/artifact.py"),
            Path::new("/tmp/s/artifact_bin"),
        );
        assert_eq!(program, "python3");
        assert!(args[0].contains("artifact.py"));
    }

    #[test]
    fn test_error_display() {
        assert!(SandboxError::Disabled.to_string().contains("disabled"));
        let err = SandboxError::ArtifactTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert!(err.to_string().contains("2048"));
    }
}
