//! Git repository operations

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use git2::{
    ApplyLocation, Diff, DiffFindOptions, DiffFormat, DiffOptions, ErrorClass, ErrorCode, ObjectType,
    Oid, Repository, Status, StatusOptions, Tree,
};
use tracing::{debug, info};

use crate::git::backend::{BackendError, CommitCreationError, RepositoryBackend};
use crate::git::SHORT_HASH_LEN;

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
    verify_hooks: bool,
}

/// How the working-tree diff is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Include untracked files with their content.
    pub include_untracked: bool,
    /// Pair deleted and added files into renames.
    pub detect_renames: bool,
    /// Context lines around each hunk.
    pub context_lines: u32,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_untracked: true,
            detect_renames: true,
            context_lines: 3,
        }
    }
}

/// Working directory status
#[derive(Debug)]
pub struct WorkingDirectoryStatus {
    /// Whether the working directory has no changes
    pub clean: bool,
    /// Files with uncommitted changes, untracked ones included
    pub changes: Vec<FileStatus>,
}

/// File status information
#[derive(Debug)]
pub struct FileStatus {
    /// Git status flags (e.g., "AM", "??", "M ")
    pub status: String,
    /// Path to the file relative to repository root
    pub file: String,
}

impl GitRepository {
    /// Open repository at current directory
    pub fn open() -> Result<Self> {
        let repo = Repository::open(".").context("Not in a git repository")?;

        Ok(Self::from_repository(repo))
    }

    /// Open repository at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path).context("Failed to open git repository")?;

        Ok(Self::from_repository(repo))
    }

    fn from_repository(repo: Repository) -> Self {
        Self {
            repo,
            verify_hooks: true,
        }
    }

    /// Whether commit creation runs the repository's commit hooks.
    pub fn with_verify_hooks(mut self, verify_hooks: bool) -> Self {
        self.verify_hooks = verify_hooks;
        self
    }

    /// Get workdir path
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Get access to the underlying git2::Repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Unified diff of every pending change between the index and the
    /// working tree.
    pub fn snapshot_diff(&self, options: &SnapshotOptions) -> Result<String> {
        let index = self.fresh_index().context("Failed to read index")?;

        let mut diff_opts = DiffOptions::new();
        diff_opts
            .include_untracked(options.include_untracked)
            .recurse_untracked_dirs(options.include_untracked)
            .show_untracked_content(options.include_untracked)
            .context_lines(options.context_lines);

        let mut diff = self
            .repo
            .diff_index_to_workdir(Some(&index), Some(&mut diff_opts))
            .context("Failed to diff working tree against index")?;

        if options.detect_renames {
            let mut find_opts = DiffFindOptions::new();
            find_opts.renames(true).for_untracked(true);
            diff.find_similar(Some(&mut find_opts))
                .context("Failed to detect renames")?;
        }

        let mut text = String::new();
        let mut non_utf8 = None;
        let printed = diff.print(DiffFormat::Patch, |delta, _hunk, line| {
            let Ok(content) = std::str::from_utf8(line.content()) else {
                non_utf8 = delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(|path| path.display().to_string());
                return false;
            };
            if matches!(line.origin(), '+' | '-' | ' ') {
                text.push(line.origin());
            }
            text.push_str(content);
            true
        });
        // Units are plain text, so a lossy decode would stage altered bytes.
        if let Some(path) = non_utf8 {
            anyhow::bail!("{path} is not UTF-8 text and cannot be split into change units");
        }
        printed.context("Failed to render diff")?;

        debug!(
            files = diff.deltas().len(),
            bytes = text.len(),
            "Took working tree snapshot"
        );
        Ok(text)
    }

    /// Fails unless the index matches HEAD.
    ///
    /// Planning works on the index-to-working-tree diff, which would not
    /// show changes that are already staged.
    pub fn ensure_nothing_staged(&self) -> Result<()> {
        let staged = self
            .staged_paths()
            .context("Failed to compare index with HEAD")?;
        if !staged.is_empty() {
            anyhow::bail!(
                "Changes are already staged: {}\nUnstage them (git restore --staged .) before regrouping",
                staged.join(", ")
            );
        }
        Ok(())
    }

    /// Get working directory status
    pub fn working_directory_status(&self) -> Result<WorkingDirectoryStatus> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .context("Failed to get repository status")?;

        let changes: Vec<FileStatus> = statuses
            .iter()
            .filter_map(|entry| {
                entry.path().map(|path| FileStatus {
                    status: format_status_flags(entry.status()),
                    file: path.to_string(),
                })
            })
            .collect();

        Ok(WorkingDirectoryStatus {
            clean: changes.is_empty(),
            changes,
        })
    }

    /// Current branch name, `None` on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
            Ok(_) => Ok(None),
            Err(e) if is_unborn(&e) => {
                // Unborn branch: HEAD still names it symbolically.
                let head = self
                    .repo
                    .find_reference("HEAD")
                    .context("Failed to read HEAD")?;
                Ok(head
                    .symbolic_target()
                    .map(|target| target.trim_start_matches("refs/heads/").to_string()))
            }
            Err(e) => Err(e).context("Failed to get HEAD reference"),
        }
    }

    /// Subjects of the latest `count` commits on HEAD, newest first.
    pub fn recent_commit_messages(&self, count: usize) -> Result<Vec<String>> {
        if count == 0 || self.head_tree()?.is_none() {
            return Ok(Vec::new());
        }

        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker.push_head().context("Failed to push HEAD")?;

        let mut messages = Vec::with_capacity(count);
        for oid in walker.take(count) {
            let oid = oid.context("Failed to get commit OID from walker")?;
            let commit = self
                .repo
                .find_commit(oid)
                .context("Failed to find commit")?;
            messages.push(commit.summary().unwrap_or_default().to_string());
        }
        Ok(messages)
    }

    fn fresh_index(&self) -> std::result::Result<git2::Index, git2::Error> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        Ok(index)
    }

    fn head_tree(&self) -> std::result::Result<Option<Tree<'_>>, git2::Error> {
        match self.repo.head() {
            Ok(head) => head.peel_to_tree().map(Some),
            Err(e) if is_unborn(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn staged_paths(&self) -> std::result::Result<Vec<String>, git2::Error> {
        let index = self.fresh_index()?;
        let tree = self.head_tree()?;
        let diff = self
            .repo
            .diff_tree_to_index(tree.as_ref(), Some(&index), None)?;
        Ok(diff
            .deltas()
            .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
            .map(|path| path.display().to_string())
            .collect())
    }
}

impl RepositoryBackend for GitRepository {
    fn apply_patch_to_index(&self, patch: &str) -> std::result::Result<(), BackendError> {
        let diff = Diff::from_buffer(patch.as_bytes())
            .map_err(|e| BackendError::Tool(format!("Failed to parse patch: {}", e.message())))?;
        // Reloads the index object `apply` shares with this repository handle,
        // since `git commit` rewrites it on disk between passes.
        self.fresh_index()
            .map_err(|e| BackendError::Tool(format!("Failed to read index: {}", e.message())))?;

        self.repo
            .apply(&diff, ApplyLocation::Index, None)
            .map_err(|e| {
                if e.code() == ErrorCode::ApplyFail || e.class() == ErrorClass::Patch {
                    BackendError::Conflict(e.message().to_string())
                } else {
                    BackendError::Tool(e.message().to_string())
                }
            })?;

        debug!(files = diff.deltas().len(), "Applied patch to index");
        Ok(())
    }

    fn create_commit(&self, message: &str) -> std::result::Result<String, CommitCreationError> {
        let tool = |e: git2::Error| CommitCreationError::UnderlyingToolFailure(e.message().to_string());

        if self.staged_paths().map_err(tool)?.is_empty() {
            return Err(CommitCreationError::NothingStaged);
        }

        let workdir = self.repo.workdir().ok_or_else(|| {
            CommitCreationError::UnderlyingToolFailure("Repository has no working tree".to_string())
        })?;

        let mut command = Command::new("git");
        command
            .current_dir(workdir)
            .args(["commit", "--quiet", "--cleanup=verbatim", "--message", message]);
        if !self.verify_hooks {
            command.arg("--no-verify");
        }

        let output = command.output().map_err(|e| {
            CommitCreationError::UnderlyingToolFailure(format!("Failed to execute git commit: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CommitCreationError::UnderlyingToolFailure(
                stderr.trim().to_string(),
            ));
        }

        let head = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(tool)?;
        let id = head.id().to_string();
        info!(
            commit = &id[..SHORT_HASH_LEN.min(id.len())],
            summary = head.summary().unwrap_or_default(),
            "Created commit"
        );
        Ok(id)
    }

    fn workdir_blob_id(&self, path: &str) -> std::result::Result<Option<String>, BackendError> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| BackendError::Tool("Repository has no working tree".to_string()))?;
        let full = workdir.join(path);

        let metadata = match std::fs::symlink_metadata(&full) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Tool(format!("Failed to stat {path}: {e}"))),
        };

        let hashed = if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&full)
                .map_err(|e| BackendError::Tool(format!("Failed to read link {path}: {e}")))?;
            Oid::hash_object(ObjectType::Blob, target.to_string_lossy().as_bytes())
        } else if metadata.is_file() {
            Oid::hash_file(ObjectType::Blob, &full)
        } else {
            return Ok(None);
        };
        let oid = hashed
            .map_err(|e| BackendError::Tool(format!("Failed to hash {path}: {}", e.message())))?;

        Ok(Some(oid.to_string()))
    }
}

fn is_unborn(error: &git2::Error) -> bool {
    matches!(error.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}

/// Format git status flags into string representation
fn format_status_flags(flags: Status) -> String {
    let index = if flags.contains(Status::INDEX_NEW) {
        'A'
    } else if flags.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if flags.contains(Status::INDEX_DELETED) {
        'D'
    } else if flags.contains(Status::INDEX_RENAMED) {
        'R'
    } else if flags.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };

    let worktree = if flags.contains(Status::WT_NEW) {
        if index == ' ' {
            return "??".to_string();
        }
        '?'
    } else if flags.contains(Status::WT_MODIFIED) {
        'M'
    } else if flags.contains(Status::WT_DELETED) {
        'D'
    } else if flags.contains(Status::WT_TYPECHANGE) {
        'T'
    } else if flags.contains(Status::WT_RENAMED) {
        'R'
    } else {
        ' '
    };

    format!("{index}{worktree}")
}
