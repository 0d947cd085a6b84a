//! Stages arbitrary subsets of change units into the index.
//!
//! Each call builds one synthetic multi-file patch from the selected units.
//! Hunk positions are recomputed against the index as it stands after
//! earlier calls, so units of one file can be staged across several passes
//! in any order.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, info};

use crate::git::backend::{BackendError, RepositoryBackend};
use crate::git::change_unit::{ChangeKind, ChangeSet, ChangeUnit, UnitId};
use crate::git::diff_split::is_null_blob;

/// Failure to stage a group of units. The index is unchanged in every case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    /// The synthetic patch does not apply, or the working tree no longer
    /// matches the snapshot the units were taken from.
    #[error("patch apply conflict: {reason}")]
    PatchApplyConflict {
        /// What did not match.
        reason: String,
    },

    /// The underlying tool failed for a reason unrelated to patch content.
    #[error("staging failed: {0}")]
    UnderlyingToolFailure(String),

    /// The id is not part of the snapshot.
    #[error("unknown change unit {0}")]
    UnknownUnit(UnitId),

    /// The unit was already staged by an earlier call.
    #[error("change unit {0} is already staged")]
    AlreadyStaged(UnitId),
}

impl From<BackendError> for StagingError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict(reason) => Self::PatchApplyConflict { reason },
            BackendError::Tool(message) => Self::UnderlyingToolFailure(message),
        }
    }
}

/// Tracks which units of a snapshot have reached the index.
#[derive(Debug, Clone)]
pub struct SelectiveStager {
    changes: ChangeSet,
    staged: BTreeSet<UnitId>,
}

impl SelectiveStager {
    /// Creates a stager over a fresh snapshot; nothing is staged yet.
    pub fn new(changes: ChangeSet) -> Self {
        Self {
            changes,
            staged: BTreeSet::new(),
        }
    }

    /// The snapshot being staged.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Whether the unit has been staged.
    pub fn is_staged(&self, id: UnitId) -> bool {
        self.staged.contains(&id)
    }

    /// Ids staged so far, in diff order.
    pub fn staged_ids(&self) -> Vec<UnitId> {
        self.staged.iter().copied().collect()
    }

    /// Stages exactly the given units.
    ///
    /// Either every unit reaches the index or none does.
    pub fn stage(
        &mut self,
        ids: &[UnitId],
        backend: &dyn RepositoryBackend,
    ) -> Result<(), StagingError> {
        let selected = self.select(ids)?;
        if selected.is_empty() {
            return Ok(());
        }

        self.check_fresh(&selected, backend)?;

        let patch = self.render_patch(&selected);
        debug!(
            units = ?ids,
            patch_len = patch.len(),
            "Applying synthetic patch to index"
        );
        let staged_now: Vec<UnitId> = selected.iter().map(|u| u.id).collect();
        backend.apply_patch_to_index(&patch)?;

        self.staged.extend(staged_now);
        info!(units = ?ids, "Staged change units");
        Ok(())
    }

    /// Builds the patch that [`stage`](Self::stage) would apply, without
    /// touching the repository.
    pub fn build_patch(&self, ids: &[UnitId]) -> Result<String, StagingError> {
        let selected = self.select(ids)?;
        Ok(self.render_patch(&selected))
    }

    /// Resolves ids to units in diff order, rejecting unknown and already
    /// staged ones.
    fn select(&self, ids: &[UnitId]) -> Result<Vec<&ChangeUnit>, StagingError> {
        let mut unique = BTreeSet::new();
        for &id in ids {
            if self.changes.get(id).is_none() {
                return Err(StagingError::UnknownUnit(id));
            }
            if self.staged.contains(&id) {
                return Err(StagingError::AlreadyStaged(id));
            }
            unique.insert(id);
        }
        Ok(unique
            .into_iter()
            .filter_map(|id| self.changes.get(id))
            .collect())
    }

    /// Verifies that each touched file still has the content the snapshot
    /// was taken from.
    fn check_fresh(
        &self,
        selected: &[&ChangeUnit],
        backend: &dyn RepositoryBackend,
    ) -> Result<(), StagingError> {
        let mut seen = BTreeSet::new();
        for unit in selected {
            if !seen.insert(unit.file_index) {
                continue;
            }

            let current = backend.workdir_blob_id(&unit.file_path)?;
            let stale = if unit.change_kind == ChangeKind::Deleted {
                current.is_some()
            } else {
                match unit.new_blob.as_deref() {
                    Some(expected) if !is_null_blob(expected) => current
                        .as_deref()
                        .map_or(true, |actual| !actual.starts_with(expected)),
                    _ => false,
                }
            };

            if stale {
                debug!(
                    path = %unit.file_path,
                    expected = ?unit.new_blob,
                    actual = ?current,
                    "Working tree no longer matches snapshot"
                );
                return Err(StagingError::PatchApplyConflict {
                    reason: format!(
                        "{} changed in the working tree since the diff was taken",
                        unit.file_path
                    ),
                });
            }
        }
        Ok(())
    }

    fn render_patch(&self, selected: &[&ChangeUnit]) -> String {
        let mut by_file: BTreeMap<usize, Vec<&ChangeUnit>> = BTreeMap::new();
        for &unit in selected {
            by_file.entry(unit.file_index).or_default().push(unit);
        }

        let mut patch = String::new();
        for (file_index, units) in by_file {
            let siblings_staged = self
                .changes
                .file_units(file_index)
                .any(|u| self.staged.contains(&u.id));
            let Some(first) = units.first() else {
                continue;
            };
            patch.push_str(&patch_file_header(&first.file_header, siblings_staged));

            for unit in &units {
                match unit.hunk {
                    Some(hunk) => {
                        let old_before = hunk.old_lines_before()
                            + self.delta_before(file_index, unit.position, |u| {
                                self.staged.contains(&u.id)
                            });
                        let new_before = old_before
                            + units
                                .iter()
                                .filter(|u| u.position < unit.position)
                                .map(|u| u.line_delta())
                                .sum::<i64>();
                        let header = hunk.positioned(old_before, new_before);
                        patch.push_str(&replace_hunk_header(&unit.content, &header.to_string()));
                    }
                    None => patch.push_str(&unit.content),
                }
            }
        }
        patch
    }

    /// Sum of line deltas of the file's units that precede `position` and
    /// satisfy `include`.
    fn delta_before(
        &self,
        file_index: usize,
        position: usize,
        include: impl Fn(&ChangeUnit) -> bool,
    ) -> i64 {
        self.changes
            .file_units(file_index)
            .filter(|u| u.position < position && include(u))
            .map(ChangeUnit::line_delta)
            .sum()
    }
}

/// Adapts a file header for a partial patch.
///
/// Mode lines are dropped once an earlier pass has applied them. The
/// `index` line is dropped too, unless a mode change is still carried:
/// libgit2 rejects `old mode`/`new mode` headers without it.
fn patch_file_header(header: &str, siblings_staged: bool) -> String {
    let is_mode_line = |line: &str| line.starts_with("old mode ") || line.starts_with("new mode ");
    let keeps_mode_change = !siblings_staged && header.lines().any(|l| l.starts_with("old mode "));

    header
        .split_inclusive('\n')
        .filter(|line| {
            if is_mode_line(*line) {
                !siblings_staged
            } else if line.starts_with("index ") {
                keeps_mode_change
            } else {
                true
            }
        })
        .collect()
}

/// Swaps the range part of a hunk's `@@` line, keeping the section text.
fn replace_hunk_header(content: &str, header: &str) -> String {
    let line_end = content.find('\n').unwrap_or(content.len());
    let (first_line, rest) = content.split_at(line_end);
    let section = first_line
        .get(2..)
        .and_then(|tail| tail.find("@@").map(|i| &tail[i + 2..]))
        .unwrap_or("");
    format!("{header}{section}{rest}")
}
