//! # TaskStore — single source of truth for task lifecycle
//!
//! ## Responsibility
//! Hold task records and their status/result, and provide the FIFO queue
//! the dispatch loop consumes. All mutation is serialized through a single
//! async mutex so no update is lost under concurrent access.
//!
//! ## Guarantees
//! - Atomic: two concurrent `dequeue` calls never return the same task
//! - FIFO: tasks are dequeued in submission order
//! - Monotonic: terminal statuses (completed/failed/cancelled) never revert
//! - Advisory cancellation: cancelling an in-flight task only updates the
//!   status record; it does not preempt the running agent or sandbox session
//!
//! ## NOT Responsible For
//! - Task processing (see: center.rs)
//! - Artifact production (see: agent module)

use crate::artifact::Artifact;
use crate::task::{Task, TaskStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors produced by the task store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced task id does not exist in the store.
    #[error("task not found: {id}")]
    TaskNotFound {
        /// The task id that was not found.
        id: String,
    },

    /// The requested transition would regress a terminal status.
    #[error("invalid transition for task {id}: already {status}")]
    InvalidTransition {
        /// The task id.
        id: String,
        /// The terminal status the task already holds.
        status: TaskStatus,
    },
}

/// The resolved outcome of a task, as exposed by [`TaskStore::result`].
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The task completed with this artifact.
    Artifact(Artifact),
    /// The task failed or was cancelled with this error message.
    Error(String),
    /// The task has no terminal outcome yet (or the id is unknown).
    Unresolved,
}

impl TaskOutcome {
    /// Returns `true` for the [`TaskOutcome::Artifact`] variant.
    pub fn is_artifact(&self) -> bool {
        matches!(self, Self::Artifact(_))
    }

    /// Returns `true` for the [`TaskOutcome::Error`] variant.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A task plus its mutable lifecycle state.
#[derive(Debug, Clone)]
struct TaskRecord {
    task: Task,
    status: TaskStatus,
    artifact: Option<Artifact>,
    error: Option<String>,
    started_at: Option<Instant>,
}

/// Counters and derived figures exposed by [`TaskStore::metrics`].
#[derive(Debug, Clone, Default)]
pub struct StoreMetrics {
    /// Tasks waiting in the queue.
    pub pending: usize,
    /// Tasks currently being processed.
    pub in_progress: usize,
    /// Tasks that completed with an artifact.
    pub completed: u64,
    /// Tasks that failed with an error.
    pub failed: u64,
    /// Tasks cancelled before completion.
    pub cancelled: u64,
    /// Tasks that reached a processed terminal state (completed + failed).
    pub processed: u64,
    /// Mean wall-clock processing time across processed tasks.
    pub avg_processing_time: Duration,
}

struct StoreInner {
    queue: VecDeque<String>,
    records: HashMap<String, TaskRecord>,
    completed: u64,
    failed: u64,
    cancelled: u64,
    total_processing: Duration,
}

/// Thread-safe task store. Clone is cheap (Arc-backed); all clones share
/// the same state.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                queue: VecDeque::new(),
                records: HashMap::new(),
                completed: 0,
                failed: 0,
                cancelled: 0,
                total_processing: Duration::ZERO,
            })),
        }
    }

    /// Enqueue a task with status `Pending` and return its id.
    pub async fn enqueue(&self, task: Task) -> String {
        let id = task.id.clone();
        let mut inner = self.inner.lock().await;
        inner.queue.push_back(id.clone());
        inner.records.insert(
            id.clone(),
            TaskRecord {
                task,
                status: TaskStatus::Pending,
                artifact: None,
                error: None,
                started_at: None,
            },
        );
        id
    }

    /// Pop the head of the queue.
    ///
    /// Atomic under the store mutex: a given task is delivered at most once.
    /// Tasks cancelled while still queued are skipped, not delivered.
    pub async fn dequeue(&self) -> Option<Task> {
        let mut inner = self.inner.lock().await;
        while let Some(id) = inner.queue.pop_front() {
            match inner.records.get_mut(&id) {
                Some(record) if record.status == TaskStatus::Pending => {
                    record.started_at = Some(Instant::now());
                    return Some(record.task.clone());
                }
                // Cancelled (or otherwise moved on) while queued — skip.
                _ => continue,
            }
        }
        None
    }

    /// Update the status of a non-terminal task.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TaskNotFound`] for unknown ids
    /// - [`StoreError::InvalidTransition`] when the task is already terminal
    pub async fn update_status(&self, id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        if record.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                status: record.status,
            });
        }
        record.status = status;
        Ok(())
    }

    /// Mark a task completed with its artifact.
    ///
    /// # Errors
    ///
    /// Same as [`TaskStore::update_status`].
    pub async fn complete(&self, id: &str, artifact: Artifact) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        if record.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                status: record.status,
            });
        }
        record.status = TaskStatus::Completed;
        record.artifact = Some(artifact);
        let elapsed = record
            .started_at
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO);
        inner.completed += 1;
        inner.total_processing += elapsed;
        Ok(())
    }

    /// Mark a task failed with an error message.
    ///
    /// # Errors
    ///
    /// Same as [`TaskStore::update_status`].
    pub async fn fail(&self, id: &str, error: impl Into<String>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        if record.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                status: record.status,
            });
        }
        record.status = TaskStatus::Failed;
        record.error = Some(error.into());
        let elapsed = record
            .started_at
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO);
        inner.failed += 1;
        inner.total_processing += elapsed;
        Ok(())
    }

    /// Cancel a pending or in-progress task.
    ///
    /// Advisory only: an in-flight task keeps running until its current
    /// processing step finishes; only the status record changes here.
    ///
    /// # Errors
    ///
    /// Same as [`TaskStore::update_status`].
    pub async fn cancel(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })?;
        if !record.status.is_cancellable() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                status: record.status,
            });
        }
        record.status = TaskStatus::Cancelled;
        record.error = Some("cancelled".to_string());
        inner.cancelled += 1;
        Ok(())
    }

    /// Current status of a task; `NotFound` for unknown ids.
    pub async fn status(&self, id: &str) -> TaskStatus {
        let inner = self.inner.lock().await;
        inner
            .records
            .get(id)
            .map(|r| r.status)
            .unwrap_or(TaskStatus::NotFound)
    }

    /// Resolved outcome of a task: artifact, error, or unresolved.
    pub async fn result(&self, id: &str) -> TaskOutcome {
        let inner = self.inner.lock().await;
        match inner.records.get(id) {
            Some(record) => {
                if let Some(artifact) = &record.artifact {
                    TaskOutcome::Artifact(artifact.clone())
                } else if let Some(error) = &record.error {
                    TaskOutcome::Error(error.clone())
                } else {
                    TaskOutcome::Unresolved
                }
            }
            None => TaskOutcome::Unresolved,
        }
    }

    /// Snapshot of store counters and derived figures.
    pub async fn metrics(&self) -> StoreMetrics {
        let inner = self.inner.lock().await;
        let pending = inner
            .records
            .values()
            .filter(|r| r.status == TaskStatus::Pending)
            .count();
        let in_progress = inner
            .records
            .values()
            .filter(|r| r.status == TaskStatus::InProgress)
            .count();
        let processed = inner.completed + inner.failed;
        let avg_processing_time = if processed == 0 {
            Duration::ZERO
        } else {
            inner.total_processing / processed as u32
        };
        StoreMetrics {
            pending,
            in_progress,
            completed: inner.completed,
            failed: inner.failed,
            cancelled: inner.cancelled,
            processed,
            avg_processing_time,
        }
    }
}
