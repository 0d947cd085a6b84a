//! Primitive version-control operations the stager and session drive.

use thiserror::Error;

/// Failure of a primitive index operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The patch does not apply to the current index or working tree.
    #[error("patch does not apply: {0}")]
    Conflict(String),

    /// Any other failure of the underlying tool.
    #[error("{0}")]
    Tool(String),
}

/// Failure while turning the staged set into a commit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitCreationError {
    /// The index matches HEAD, so there is nothing to commit.
    #[error("nothing is staged for commit")]
    NothingStaged,

    /// The commit command or repository access failed.
    #[error("commit creation failed: {0}")]
    UnderlyingToolFailure(String),
}

/// Repository operations a session needs.
///
/// Each call is atomic on its own: a failed `apply_patch_to_index` leaves
/// the index untouched, and a failed `create_commit` leaves the staged set
/// in place.
pub trait RepositoryBackend {
    /// Applies a unified diff to the index only.
    fn apply_patch_to_index(&self, patch: &str) -> Result<(), BackendError>;

    /// Commits the staged set with `message`, returning the new commit id.
    fn create_commit(&self, message: &str) -> Result<String, CommitCreationError>;

    /// Blob id of the working-tree file at `path`, `None` when it is absent.
    fn workdir_blob_id(&self, path: &str) -> Result<Option<String>, BackendError>;
}
