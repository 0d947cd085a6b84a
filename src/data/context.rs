//! Rendering of a change snapshot into the text handed to a plan generator.

use serde::{Deserialize, Serialize};

use crate::git::{ChangeKind, ChangeSet, ChangeUnit, UnitId};

/// Default number of content lines shown per change unit.
pub const DEFAULT_TRUNCATE_LINES: usize = 120;

/// Default number of recent commit subjects included.
pub const DEFAULT_LATEST_COMMITS: usize = 5;

/// Everything a plan generator needs to propose commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalContext {
    /// Human- and model-readable description of the pending changes.
    pub text: String,
    /// Ids the plan must draw from.
    pub unit_ids: Vec<UnitId>,
    /// Whether the plan may leave units out.
    pub allow_exclusions: bool,
}

/// Formats change units, branch and history into a [`ProposalContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFormatter {
    /// Maximum content lines per unit; `None` shows everything.
    pub truncate_lines: Option<usize>,
    /// Number of recent commit subjects to include.
    pub include_latest_commits: usize,
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self {
            truncate_lines: Some(DEFAULT_TRUNCATE_LINES),
            include_latest_commits: DEFAULT_LATEST_COMMITS,
        }
    }
}

impl ContextFormatter {
    /// Renders the proposal context.
    pub fn format(
        &self,
        changes: &ChangeSet,
        branch: Option<&str>,
        recent_commits: &[String],
        allow_exclusions: bool,
    ) -> ProposalContext {
        let mut text = String::new();

        text.push_str(&format!("Branch: {}\n", branch.unwrap_or("(detached HEAD)")));

        let recent: Vec<&String> = recent_commits
            .iter()
            .take(self.include_latest_commits)
            .collect();
        if !recent.is_empty() {
            text.push_str("\nLatest commits:\n");
            for subject in recent {
                text.push_str(&format!("- {subject}\n"));
            }
        }

        text.push_str(&format!("\nChanges ({}):\n", changes.len()));
        for unit in changes.units() {
            text.push('\n');
            text.push_str(&self.format_unit(unit));
        }

        ProposalContext {
            text,
            unit_ids: changes.ids(),
            allow_exclusions,
        }
    }

    fn format_unit(&self, unit: &ChangeUnit) -> String {
        let origin = match (&unit.change_kind, &unit.old_path) {
            (ChangeKind::Renamed, Some(old)) => format!("renamed from {old}"),
            (kind, _) => kind.to_string(),
        };
        let mut out = format!("Change {}: {} ({origin})\n", unit.id, unit.file_path);

        let lines: Vec<&str> = unit.content.lines().collect();
        if lines.is_empty() {
            out.push_str("(no textual changes)\n");
            return out;
        }

        let shown = self.truncate_lines.map_or(lines.len(), |limit| limit.min(lines.len()));
        for line in &lines[..shown] {
            out.push_str(line);
            out.push('\n');
        }
        if shown < lines.len() {
            out.push_str(&format!("... ({} more lines)\n", lines.len() - shown));
        }
        out
    }
}
