//! # FeedbackGate — human-approval interception point
//!
//! ## Responsibility
//! Intercept security- and improvement-risk decisions for optional human
//! approval. Registers pending-approval records; resolution happens
//! out-of-band via `approve`/`reject`.
//!
//! ## Approval semantics
//! When human-in-the-loop is disabled, `request_approval` auto-approves and
//! logs — a deliberate but risky default, flagged loudly rather than
//! silently altered. When enabled, `request_approval` registers the record
//! and returns `false` immediately (immediate-deny-until-explicit-approval):
//! blocking the single dispatch consumer on a human decision would stall
//! every queued task. An operator approves or rejects the record and
//! resubmits the task.
//!
//! ## NOT Responsible For
//! - Scanning artifacts (see: security.rs)
//! - Applying improvement actions (see: improvement module)

use crate::artifact::{unix_now, Artifact};
use crate::improvement::ImprovementAction;
use crate::security::SecurityIssue;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors produced by the feedback gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The referenced approval record does not exist.
    #[error("approval record not found: {0}")]
    NotFound(String),

    /// The record was already resolved.
    #[error("approval record already resolved: {0}")]
    AlreadyResolved(String),
}

/// Resolution state of an approval record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalState {
    /// Awaiting an out-of-band decision.
    Pending,
    /// Approved (explicitly or automatically).
    Approved,
    /// Rejected with a reason.
    Rejected(String),
}

/// A registered approval request for an insecure artifact.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    /// Unique record id (UUID).
    pub id: String,
    /// The artifact awaiting approval.
    pub artifact_id: String,
    /// Scanner issues that triggered the request.
    pub issues: Vec<SecurityIssue>,
    /// Current resolution state.
    pub state: ApprovalState,
    /// Unix timestamp (seconds) when the record was created.
    pub created_at: u64,
}

struct GateInner {
    human_in_the_loop: bool,
    approvals: DashMap<String, ApprovalRequest>,
    proposals: Mutex<Vec<ImprovementAction>>,
}

/// Human-approval gate. Clone is cheap (Arc-backed); all clones share state.
#[derive(Clone)]
pub struct FeedbackGate {
    inner: Arc<GateInner>,
}

impl FeedbackGate {
    /// Create a gate.
    pub fn new(human_in_the_loop: bool) -> Self {
        Self {
            inner: Arc::new(GateInner {
                human_in_the_loop,
                approvals: DashMap::new(),
                proposals: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether human approval is required.
    pub fn human_in_the_loop(&self) -> bool {
        self.inner.human_in_the_loop
    }

    /// Request approval for an artifact flagged by the security scanner.
    ///
    /// Registers a record, then:
    /// - human-in-the-loop off: auto-approves and returns `true`; the
    ///   permissive default is logged loudly rather than silently applied
    /// - human-in-the-loop on: returns `false` immediately; the record
    ///   stays pending until [`approve`](Self::approve) or
    ///   [`reject`](Self::reject) resolves it
    pub fn request_approval(&self, artifact: &Artifact, issues: &[SecurityIssue]) -> bool {
        let id = uuid::Uuid::new_v4().to_string();
        let auto = !self.inner.human_in_the_loop;
        let record = ApprovalRequest {
            id: id.clone(),
            artifact_id: artifact.id.clone(),
            issues: issues.to_vec(),
            state: if auto {
                ApprovalState::Approved
            } else {
                ApprovalState::Pending
            },
            created_at: unix_now(),
        };
        self.inner.approvals.insert(id.clone(), record);

        if auto {
            warn!(
                approval_id = %id,
                artifact_id = %artifact.id,
                issues = issues.len(),
                "human-in-the-loop disabled: insecure artifact auto-approved"
            );
            true
        } else {
            info!(
                approval_id = %id,
                artifact_id = %artifact.id,
                issues = issues.len(),
                "approval requested; denied until explicitly approved"
            );
            false
        }
    }

    /// One-way notification of a proposed improvement action.
    pub fn propose(&self, action: &ImprovementAction) {
        info!(
            action_id = %action.id,
            kind = %action.kind,
            priority = ?action.priority,
            "improvement action proposed for review"
        );
        self.inner.proposals.lock().push(action.clone());
    }

    /// Approve a pending record out-of-band.
    ///
    /// # Errors
    ///
    /// - [`GateError::NotFound`] for unknown ids
    /// - [`GateError::AlreadyResolved`] when the record is not pending
    pub fn approve(&self, id: &str) -> Result<(), GateError> {
        let mut record = self
            .inner
            .approvals
            .get_mut(id)
            .ok_or_else(|| GateError::NotFound(id.to_string()))?;
        if record.state != ApprovalState::Pending {
            return Err(GateError::AlreadyResolved(id.to_string()));
        }
        record.state = ApprovalState::Approved;
        info!(approval_id = %id, "approval granted");
        Ok(())
    }

    /// Reject a pending record out-of-band with a reason.
    ///
    /// # Errors
    ///
    /// Same as [`FeedbackGate::approve`].
    pub fn reject(&self, id: &str, reason: impl Into<String>) -> Result<(), GateError> {
        let mut record = self
            .inner
            .approvals
            .get_mut(id)
            .ok_or_else(|| GateError::NotFound(id.to_string()))?;
        if record.state != ApprovalState::Pending {
            return Err(GateError::AlreadyResolved(id.to_string()));
        }
        let reason = reason.into();
        info!(approval_id = %id, reason = %reason, "approval rejected");
        record.state = ApprovalState::Rejected(reason);
        Ok(())
    }

    /// Resolution state of a record, if it exists.
    pub fn state(&self, id: &str) -> Option<ApprovalState> {
        self.inner.approvals.get(id).map(|r| r.state.clone())
    }

    /// All records still awaiting a decision.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        self.inner
            .approvals
            .iter()
            .filter(|r| r.value().state == ApprovalState::Pending)
            .map(|r| r.value().clone())
            .collect()
    }

    /// All improvement actions proposed so far.
    pub fn proposals(&self) -> Vec<ImprovementAction> {
        self.inner.proposals.lock().clone()
    }
}
