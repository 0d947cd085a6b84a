//! CLI interface for git-regroup.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::claude::create_default_plan_generator;
use crate::config::RegroupConfig;
use crate::data::{CommitPlan, ProposalContext};
use crate::git::{decompose, ChangeSet, GitRepository};
use crate::session::{FilePlanGenerator, PlanGenerator};
use crate::utils::check_regroup_repository;

pub mod apply;
pub mod propose;
pub mod reporter;
pub mod units;
pub mod validate;

/// git-regroup: split uncommitted changes into coherent commits.
#[derive(Parser)]
#[command(name = "git-regroup")]
#[command(
    about = "Split uncommitted changes into a sequence of coherent commits",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Lists the change units of the working tree.
    Units(units::UnitsCommand),
    /// Asks the AI for a commit plan and prints or saves it.
    Propose(propose::ProposeCommand),
    /// Checks a plan file against the working tree without changing anything.
    Validate(validate::ValidateCommand),
    /// Applies a commit plan one proposal at a time.
    Apply(apply::ApplyCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Units(cmd) => cmd.execute(),
            Commands::Propose(cmd) => cmd.execute().await,
            Commands::Validate(cmd) => cmd.execute(),
            Commands::Apply(cmd) => cmd.execute().await,
        }
    }
}

/// Repository, configuration and decomposed diff taken at command start.
pub(crate) struct Snapshot {
    pub repo: GitRepository,
    pub config: RegroupConfig,
    pub diff: String,
    pub changes: ChangeSet,
}

impl Snapshot {
    /// Opens the repository in the current directory and decomposes its
    /// pending changes.
    pub fn take() -> Result<Self> {
        let repo = check_regroup_repository()?;
        let workdir = repo
            .workdir()
            .context("Repository has no working directory")?
            .to_path_buf();
        let config = RegroupConfig::load(&workdir)?;
        let repo = repo.with_verify_hooks(config.verify_hooks);

        let diff = repo
            .snapshot_diff(&config.snapshot_options())
            .context("Failed to read working tree changes")?;
        let changes = decompose(&diff);
        info!(
            workdir = %workdir.display(),
            units = changes.len(),
            "Took working tree snapshot"
        );

        Ok(Self {
            repo,
            config,
            diff,
            changes,
        })
    }

    /// Context handed to plan generators.
    pub fn proposal_context(&self, allow_exclusions: bool) -> Result<ProposalContext> {
        let branch = self.repo.current_branch()?;
        let recent = self
            .repo
            .recent_commit_messages(self.config.include_latest_commits)?;
        Ok(self.config.context_formatter().format(
            &self.changes,
            branch.as_deref(),
            &recent,
            allow_exclusions,
        ))
    }

    /// Loads a plan from `plan_file`, or asks the configured AI provider
    /// for one when no file is given.
    pub async fn obtain_plan(
        &self,
        plan_file: Option<&Path>,
        model: Option<String>,
        allow_exclusions: bool,
    ) -> Result<CommitPlan> {
        let generator: Box<dyn PlanGenerator> = match plan_file {
            Some(path) => Box::new(FilePlanGenerator::new(path)),
            None => {
                let generator =
                    create_default_plan_generator(model.or_else(|| self.config.model.clone()))?;
                let metadata = generator.metadata();
                println!(
                    "🤖 Asking {} ({}) for a commit plan...",
                    metadata.provider, metadata.model
                );
                Box::new(generator)
            }
        };

        let context = self.proposal_context(allow_exclusions)?;
        generator.generate_plan(&context).await
    }
}
