//! Commit plans: ordered proposals grouping change units into commits.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::yaml::{extract_yaml_block, from_yaml, read_yaml_file, write_yaml_file};
use crate::git::UnitId;

/// One candidate commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitProposal {
    /// Commit message, used verbatim.
    #[serde(alias = "commit_message")]
    pub message: String,
    /// Change units this commit contains.
    #[serde(alias = "change_ids", alias = "hunk_ids")]
    pub unit_ids: Vec<UnitId>,
    /// Why these units belong together. Informational only.
    #[serde(default, alias = "reasoning", skip_serializing_if = "String::is_empty")]
    pub rationale: String,
}

impl CommitProposal {
    /// Creates a proposal without rationale.
    pub fn new(message: impl Into<String>, unit_ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            message: message.into(),
            unit_ids: unit_ids.into_iter().map(UnitId).collect(),
            rationale: String::new(),
        }
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim()
    }
}

/// Ordered proposals for one diff snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    /// Proposals in application order.
    #[serde(default, alias = "commit_proposals", alias = "commits")]
    pub proposals: Vec<CommitProposal>,
}

impl CommitPlan {
    /// Creates a plan from proposals.
    pub fn new(proposals: Vec<CommitProposal>) -> Self {
        Self { proposals }
    }

    /// Loads a plan from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_yaml_file(&path)
            .with_context(|| format!("Failed to load commit plan: {}", path.as_ref().display()))
    }

    /// Saves the plan as YAML.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_yaml_file(self, &path)
            .with_context(|| format!("Failed to save commit plan: {}", path.as_ref().display()))
    }

    /// Parses a plan from free-form text that may wrap the YAML in code
    /// fences.
    pub fn from_reply(text: &str) -> Result<Self> {
        from_yaml(extract_yaml_block(text)).context("Reply does not contain a valid commit plan")
    }

    /// Number of proposals.
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Whether the plan has no proposals.
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}
