//! Repository-local configuration.
//!
//! Read from `<workdir>/.git-regroup/config.yaml`. Every field is optional
//! and falls back to its default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::context::{ContextFormatter, DEFAULT_LATEST_COMMITS, DEFAULT_TRUNCATE_LINES};
use crate::git::SnapshotOptions;

/// Directory holding repository-local configuration.
pub const CONFIG_DIR: &str = ".git-regroup";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

/// Regrouping configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegroupConfig {
    /// Whether plans may leave change units uncommitted.
    pub allow_exclusions: bool,
    /// Content lines shown per change unit in the proposal context.
    pub truncate_lines: Option<usize>,
    /// Number of recent commit subjects shown in the proposal context.
    pub include_latest_commits: usize,
    /// Whether untracked files are part of the snapshot.
    pub include_untracked: bool,
    /// Whether deleted and added files are paired into renames.
    pub detect_renames: bool,
    /// Context lines around each hunk.
    pub context_lines: u32,
    /// Whether commit hooks run; `false` commits with `--no-verify`.
    pub verify_hooks: bool,
    /// Model override for plan generation.
    pub model: Option<String>,
}

impl Default for RegroupConfig {
    fn default() -> Self {
        Self {
            allow_exclusions: false,
            truncate_lines: Some(DEFAULT_TRUNCATE_LINES),
            include_latest_commits: DEFAULT_LATEST_COMMITS,
            include_untracked: true,
            detect_renames: true,
            context_lines: 3,
            verify_hooks: true,
            model: None,
        }
    }
}

impl RegroupConfig {
    /// Path of the configuration file for a working tree.
    pub fn path_in(workdir: &Path) -> PathBuf {
        workdir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Loads the configuration for a working tree, or defaults when the
    /// file does not exist.
    pub fn load(workdir: &Path) -> Result<Self> {
        let path = Self::path_in(workdir);
        if !path.exists() {
            debug!(path = %path.display(), "No repository config, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Options for taking the working-tree snapshot.
    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            include_untracked: self.include_untracked,
            detect_renames: self.detect_renames,
            context_lines: self.context_lines,
        }
    }

    /// Formatter for the proposal context.
    pub fn context_formatter(&self) -> ContextFormatter {
        ContextFormatter {
            truncate_lines: self.truncate_lines,
            include_latest_commits: self.include_latest_commits,
        }
    }
}
