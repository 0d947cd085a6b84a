//! Git operations: diff decomposition, selective staging and repository access.

pub mod backend;
pub mod change_unit;
pub mod diff_split;
pub mod repository;
pub mod stager;

pub use backend::{BackendError, CommitCreationError, RepositoryBackend};
pub use change_unit::{decompose, ChangeKind, ChangeSet, ChangeUnit, UnitId};
pub use repository::{GitRepository, SnapshotOptions};
pub use stager::{SelectiveStager, StagingError};

/// Number of hex characters to show in abbreviated commit hashes.
pub const SHORT_HASH_LEN: usize = 8;
