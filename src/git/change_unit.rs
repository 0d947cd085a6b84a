//! Decomposition of a working-tree diff into independently stageable units.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::git::diff_split::{
    file_header, parse_file_header, preamble, split_by_file, split_file_by_hunk, FileHeader,
    HunkHeader,
};

/// Identifier of a [`ChangeUnit`], unique within one [`ChangeSet`].
///
/// Ids are assigned sequentially from 1 in diff order (file, then position
/// within the file), so decomposing the same diff twice yields the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What happened to the file a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// New file (including copies).
    Added,
    /// Existing file with content or mode changes.
    Modified,
    /// Removed file.
    Deleted,
    /// File moved, possibly with content changes.
    Renamed,
}

impl ChangeKind {
    fn from_header(header: &FileHeader) -> Self {
        if header.is_new || header.is_copy {
            Self::Added
        } else if header.is_deleted {
            Self::Deleted
        } else if header.is_rename {
            Self::Renamed
        } else {
            Self::Modified
        }
    }

    /// Single-letter git status code.
    pub fn status_code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
        };
        f.write_str(name)
    }
}

/// The smallest addressable piece of a diff that can be staged on its own.
///
/// A modified file contributes one unit per hunk. Added, deleted and
/// renamed files contribute a single unit carrying every hunk, as do
/// sections without hunks (mode-only changes, binary files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeUnit {
    /// Stable identifier within the owning [`ChangeSet`].
    pub id: UnitId,
    /// Path the change applies to (the pre-image path for deletions).
    pub file_path: String,
    /// Source path of a rename.
    pub old_path: Option<String>,
    /// Kind of file-level change.
    pub change_kind: ChangeKind,
    /// Metadata lines of the file section, shared by every unit of the file.
    pub file_header: String,
    /// Hunk text (from the `@@` line on) or the whole file body for
    /// whole-file units.
    pub content: String,
    /// Parsed line ranges for per-hunk units; `None` for whole-file units.
    pub hunk: Option<HunkHeader>,
    /// Index of the file section within the diff.
    pub file_index: usize,
    /// Index of the unit within its file section.
    pub position: usize,
    /// Abbreviated pre-image blob id from the file header, if present.
    pub old_blob: Option<String>,
    /// Abbreviated post-image blob id from the file header, if present.
    pub new_blob: Option<String>,
}

impl ChangeUnit {
    /// Whether this unit opens its file section.
    pub fn is_first_in_file(&self) -> bool {
        self.position == 0
    }

    /// Whether this unit carries the whole file section.
    pub fn is_whole_file(&self) -> bool {
        self.hunk.is_none()
    }

    /// Self-contained patch text: file header followed by this unit's content.
    pub fn patch_text(&self) -> String {
        format!("{}{}", self.file_header, self.content)
    }

    /// Net number of lines this unit adds to its file.
    pub fn line_delta(&self) -> i64 {
        self.hunk.map_or(0, |h| h.line_delta())
    }

    /// Number of added lines.
    pub fn added_lines(&self) -> usize {
        self.body_lines().filter(|l| l.starts_with('+')).count()
    }

    /// Number of removed lines.
    pub fn removed_lines(&self) -> usize {
        self.body_lines().filter(|l| l.starts_with('-')).count()
    }

    /// Content lines, excluding `@@` headers.
    fn body_lines(&self) -> impl Iterator<Item = &str> {
        self.content.lines().filter(|l| !l.starts_with("@@ "))
    }
}

/// An ordered, lossless decomposition of one diff snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    preamble: String,
    units: Vec<ChangeUnit>,
}

/// Decomposes unified diff text into ordered change units.
///
/// Pure and deterministic. Hunks whose `@@` line cannot be parsed make
/// their file a single whole-file unit rather than failing.
pub fn decompose(diff: &str) -> ChangeSet {
    let mut units = Vec::new();
    let mut next_id = 1;

    for (file_index, file) in split_by_file(diff).iter().enumerate() {
        let header_text = file_header(&file.content);
        let header = parse_file_header(header_text);
        let change_kind = ChangeKind::from_header(&header);
        let hunks = split_file_by_hunk(file);

        let old_path = match change_kind {
            ChangeKind::Renamed => header.old_path.clone(),
            _ => None,
        };
        let mut push = |content: &str, hunk: Option<HunkHeader>, position: usize| {
            units.push(ChangeUnit {
                id: UnitId(next_id),
                file_path: file.path.clone(),
                old_path: old_path.clone(),
                change_kind,
                file_header: header_text.to_string(),
                content: content.to_string(),
                hunk,
                file_index,
                position,
                old_blob: header.old_blob.clone(),
                new_blob: header.new_blob.clone(),
            });
            next_id += 1;
        };

        let per_hunk = change_kind == ChangeKind::Modified
            && !hunks.is_empty()
            && hunks.iter().all(|h| h.header.is_some());

        if per_hunk {
            for (position, hunk) in hunks.iter().enumerate() {
                push(&hunk.content, hunk.header, position);
            }
        } else {
            push(&file.content[header_text.len()..], None, 0);
        }
    }

    debug!(unit_count = units.len(), diff_len = diff.len(), "Decomposed diff");

    ChangeSet {
        preamble: preamble(diff).to_string(),
        units,
    }
}

impl ChangeSet {
    /// Returns all units in id order.
    pub fn units(&self) -> &[ChangeUnit] {
        &self.units
    }

    /// Returns the unit with the given id.
    pub fn get(&self, id: UnitId) -> Option<&ChangeUnit> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.units.get(index).filter(|unit| unit.id == id)
    }

    /// Returns all ids in order.
    pub fn ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id).collect()
    }

    /// Returns the units belonging to one file section, in position order.
    pub fn file_units(&self, file_index: usize) -> impl Iterator<Item = &ChangeUnit> {
        self.units.iter().filter(move |u| u.file_index == file_index)
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the snapshot has no changes.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Reassembles the original diff text from the units.
    pub fn reassemble(&self) -> String {
        let mut text = self.preamble.clone();
        for unit in &self.units {
            if unit.is_first_in_file() {
                text.push_str(&unit.file_header);
            }
            text.push_str(&unit.content);
        }
        text
    }
}
