//! Sequencing of validated proposals through staging and commit creation.
//!
//! A [`PlanSession`] owns the remaining proposals of one diff snapshot and
//! applies them strictly in order. The first failure halts the session
//! with the failing proposal still at the head, so commit history never
//! skips a group.

pub mod error;
pub mod generator;
pub mod status;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::{validate, CommitPlan, CommitProposal, ValidatedPlan, ValidationError};
use crate::git::{decompose, ChangeSet, RepositoryBackend, SelectiveStager, UnitId};

pub use error::SessionError;
pub use generator::{FilePlanGenerator, PlanGenerator};
pub use status::{AppliedCommit, NullReporter, PlanStatus, ProposalSummary, StatusReporter};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Proposals remain and the session awaits a directive.
    Ready,
    /// The head proposal is being staged and committed.
    Applying,
    /// A step failed; the failing proposal is still at the head.
    Halted,
    /// Every proposal has been applied.
    Done,
    /// Stopped on request; applied commits are kept.
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Applying => "applying",
            Self::Halted => "halted",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Operations a controlling loop can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Apply the head proposal.
    ApplyNext,
    /// Apply proposals until none remain or one fails.
    ApplyAll,
    /// Report status without changing anything.
    Inspect,
    /// Stop, keeping commits already made.
    Abort,
}

/// Shared flag requesting a cooperative stop between proposals.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Asks the session to stop before its next proposal.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Decomposes `diff_text`, validates `plan` against its units and returns
/// a session ready to apply it.
pub fn plan_session(
    diff_text: &str,
    plan: CommitPlan,
    allow_exclusions: bool,
) -> Result<PlanSession, ValidationError> {
    let changes = decompose(diff_text);
    let validated = validate(changes.units(), plan, allow_exclusions)?;
    Ok(PlanSession::new(changes, validated))
}

/// Applies a validated plan proposal by proposal.
pub struct PlanSession {
    stager: SelectiveStager,
    remaining: VecDeque<CommitProposal>,
    total: usize,
    applied: Vec<AppliedCommit>,
    excluded: Vec<UnitId>,
    state: SessionState,
    last_error: Option<SessionError>,
    abort: AbortHandle,
    reporter: Box<dyn StatusReporter>,
}

impl fmt::Debug for PlanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanSession")
            .field("state", &self.state)
            .field("total", &self.total)
            .field("applied", &self.applied.len())
            .field("remaining", &self.remaining.len())
            .finish_non_exhaustive()
    }
}

impl PlanSession {
    /// Creates a session over a snapshot and a plan validated against it.
    ///
    /// A plan without proposals starts out [`SessionState::Done`].
    pub fn new(changes: ChangeSet, validated: ValidatedPlan) -> Self {
        let (plan, excluded) = validated.into_parts();
        let total = plan.len();
        let state = if plan.is_empty() {
            SessionState::Done
        } else {
            SessionState::Ready
        };
        debug!(
            units = changes.len(),
            proposals = total,
            excluded = excluded.len(),
            "Created plan session"
        );

        Self {
            stager: SelectiveStager::new(changes),
            remaining: plan.proposals.into(),
            total,
            applied: Vec::new(),
            excluded,
            state,
            last_error: None,
            abort: AbortHandle::default(),
            reporter: Box::new(NullReporter),
        }
    }

    /// Sends status snapshots to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn StatusReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Handle for requesting a stop from another task or signal handler.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Failure that halted the session, if any.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// The snapshot this session applies.
    pub fn changes(&self) -> &ChangeSet {
        self.stager.changes()
    }

    /// Runs one directive.
    pub fn execute(
        &mut self,
        directive: Directive,
        backend: &dyn RepositoryBackend,
    ) -> Result<PlanStatus, SessionError> {
        match directive {
            Directive::ApplyNext => self.apply_next(backend),
            Directive::ApplyAll => self.apply_all(backend),
            Directive::Inspect => Ok(self.inspect()),
            Directive::Abort => Ok(self.abort()),
        }
    }

    /// Stages and commits the head proposal.
    pub fn apply_next(
        &mut self,
        backend: &dyn RepositoryBackend,
    ) -> Result<PlanStatus, SessionError> {
        match self.state {
            SessionState::Done => return Ok(self.publish()),
            SessionState::Ready => {}
            state => {
                return Err(SessionError::InvalidState {
                    state,
                    directive: "apply the next proposal",
                })
            }
        }

        if self.abort.is_requested() {
            return Ok(self.stop());
        }
        let result = self.step(backend);
        let status = self.publish();
        result.map(|()| status)
    }

    /// Applies proposals in order until none remain, one fails, or a stop
    /// is requested.
    pub fn apply_all(
        &mut self,
        backend: &dyn RepositoryBackend,
    ) -> Result<PlanStatus, SessionError> {
        loop {
            match self.state {
                SessionState::Done => return Ok(self.publish()),
                SessionState::Ready => {}
                state => {
                    return Err(SessionError::InvalidState {
                        state,
                        directive: "apply all proposals",
                    })
                }
            }

            if self.abort.is_requested() {
                return Ok(self.stop());
            }
            if let Err(error) = self.step(backend) {
                self.publish();
                return Err(error);
            }
            self.publish();
        }
    }

    /// Reports the current status without changing anything.
    pub fn inspect(&mut self) -> PlanStatus {
        self.publish()
    }

    /// Stops the session. Commits already made stay in place.
    pub fn abort(&mut self) -> PlanStatus {
        if matches!(self.state, SessionState::Ready | SessionState::Halted) {
            self.stop()
        } else {
            self.publish()
        }
    }

    /// Retries commit creation for a proposal that was staged but not
    /// committed, without staging it again.
    pub fn retry_commit(
        &mut self,
        backend: &dyn RepositoryBackend,
    ) -> Result<PlanStatus, SessionError> {
        if !matches!(self.last_error, Some(SessionError::CommitCreation { .. })) {
            return Err(SessionError::InvalidState {
                state: self.state,
                directive: "retry commit creation",
            });
        }

        self.state = SessionState::Applying;
        let result = self.commit_head(backend);
        let status = self.publish();
        result.map(|()| status)
    }

    /// Returns a session halted by a staging failure to [`SessionState::Ready`]
    /// so the caller can try the head proposal again.
    pub fn resume(&mut self) -> Result<PlanStatus, SessionError> {
        if !matches!(self.last_error, Some(SessionError::Staging { .. })) {
            return Err(SessionError::InvalidState {
                state: self.state,
                directive: "resume",
            });
        }

        self.last_error = None;
        self.state = SessionState::Ready;
        Ok(self.publish())
    }

    /// Owned snapshot of the session.
    pub fn status(&self) -> PlanStatus {
        let first_pending = self.applied.len() + 1;
        PlanStatus {
            state: self.state,
            total: self.total,
            applied: self.applied.clone(),
            remaining: self
                .remaining
                .iter()
                .enumerate()
                .map(|(offset, proposal)| ProposalSummary {
                    position: first_pending + offset,
                    message: proposal.message.clone(),
                    unit_ids: proposal.unit_ids.clone(),
                    rationale: proposal.rationale.clone(),
                })
                .collect(),
            excluded: self.excluded.clone(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    fn step(&mut self, backend: &dyn RepositoryBackend) -> Result<(), SessionError> {
        let Some(head) = self.remaining.front() else {
            self.state = SessionState::Done;
            return Ok(());
        };
        let proposal = self.applied.len() + 1;
        let unit_ids = head.unit_ids.clone();

        self.state = SessionState::Applying;
        debug!(proposal, units = ?unit_ids, "Staging proposal");

        if let Err(error) = self.stager.stage(&unit_ids, backend) {
            return Err(self.halt(SessionError::Staging { proposal, error }));
        }
        self.commit_head(backend)
    }

    fn commit_head(&mut self, backend: &dyn RepositoryBackend) -> Result<(), SessionError> {
        let proposal = self.applied.len() + 1;
        let Some(head) = self.remaining.front() else {
            self.state = SessionState::Done;
            return Ok(());
        };

        match backend.create_commit(&head.message) {
            Ok(commit_id) => {
                if let Some(done) = self.remaining.pop_front() {
                    info!(proposal, commit = %commit_id, "Applied proposal");
                    self.applied.push(AppliedCommit {
                        position: proposal,
                        message: done.message,
                        commit_id,
                        unit_ids: done.unit_ids,
                    });
                }
                self.last_error = None;
                self.state = if self.remaining.is_empty() {
                    SessionState::Done
                } else {
                    SessionState::Ready
                };
                Ok(())
            }
            Err(error) => Err(self.halt(SessionError::CommitCreation { proposal, error })),
        }
    }

    fn halt(&mut self, error: SessionError) -> SessionError {
        warn!(%error, "Session halted");
        self.state = SessionState::Halted;
        self.last_error = Some(error.clone());
        error
    }

    fn stop(&mut self) -> PlanStatus {
        info!(remaining = self.remaining.len(), "Session aborted");
        self.state = SessionState::Aborted;
        self.publish()
    }

    fn publish(&mut self) -> PlanStatus {
        let status = self.status();
        self.reporter.report(&status);
        status
    }
}
