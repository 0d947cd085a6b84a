//! Read-only snapshots of session progress and the port they are
//! reported through.

use serde::Serialize;

use crate::git::UnitId;
use crate::session::SessionState;

/// A proposal that was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedCommit {
    /// 1-based position in the original plan.
    pub position: usize,
    /// Commit message used.
    pub message: String,
    /// Id of the created commit.
    pub commit_id: String,
    /// Units the commit contains.
    pub unit_ids: Vec<UnitId>,
}

/// A proposal still waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalSummary {
    /// 1-based position in the original plan.
    pub position: usize,
    /// Commit message.
    pub message: String,
    /// Units the proposal assigns.
    pub unit_ids: Vec<UnitId>,
    /// Rationale from the plan.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rationale: String,
}

/// Owned snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStatus {
    /// Current state.
    pub state: SessionState,
    /// Number of proposals in the validated plan.
    pub total: usize,
    /// Commits created so far, in order.
    pub applied: Vec<AppliedCommit>,
    /// Pending proposals, head first.
    pub remaining: Vec<ProposalSummary>,
    /// Units the plan leaves uncommitted.
    pub excluded: Vec<UnitId>,
    /// Description of the failure that halted the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PlanStatus {
    /// Number of pending proposals.
    pub fn remaining_count(&self) -> usize {
        self.remaining.len()
    }

    /// Whether every proposal has been applied.
    pub fn is_done(&self) -> bool {
        self.state == SessionState::Done
    }
}

/// Receives a status snapshot whenever the session changes.
pub trait StatusReporter {
    /// Called after every directive.
    fn report(&mut self, status: &PlanStatus);
}

/// Discards all reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl StatusReporter for NullReporter {
    fn report(&mut self, _status: &PlanStatus) {}
}
