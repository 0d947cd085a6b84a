//! Errors surfaced by a plan session.

use thiserror::Error;

use crate::git::{CommitCreationError, StagingError};
use crate::session::SessionState;

/// Failure of a session step. Proposal numbers are 1-based positions in
/// the original plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The proposal's units could not be staged; the index is unchanged.
    #[error("proposal {proposal} could not be staged: {error}")]
    Staging {
        /// Failing proposal.
        proposal: usize,
        /// Underlying staging failure.
        error: StagingError,
    },

    /// The proposal was staged but the commit could not be created; its
    /// units stay staged.
    #[error("proposal {proposal} was staged but not committed: {error}")]
    CommitCreation {
        /// Failing proposal.
        proposal: usize,
        /// Underlying commit failure.
        error: CommitCreationError,
    },

    /// The directive is not valid in the current state.
    #[error("cannot {directive} while the session is {state}")]
    InvalidState {
        /// State at the time of the call.
        state: SessionState,
        /// Rejected operation.
        directive: &'static str,
    },
}
