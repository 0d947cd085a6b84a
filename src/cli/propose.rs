//! `propose` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::Snapshot;
use crate::data::{to_yaml, validate};

/// Generates a commit plan for the working tree.
#[derive(Parser)]
pub struct ProposeCommand {
    /// Writes the plan to this file instead of printing it.
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// AI model to use (overrides environment configuration).
    #[arg(long)]
    pub model: Option<String>,

    /// Lets the plan leave some change units uncommitted.
    #[arg(long)]
    pub allow_exclusions: bool,
}

impl ProposeCommand {
    /// Executes the propose command.
    pub async fn execute(self) -> Result<()> {
        let snapshot = Snapshot::take()?;
        if snapshot.changes.is_empty() {
            println!("✓ Working directory is clean");
            return Ok(());
        }

        let allow_exclusions = self.allow_exclusions || snapshot.config.allow_exclusions;
        let plan = snapshot
            .obtain_plan(None, self.model, allow_exclusions)
            .await?;
        let validated = validate(snapshot.changes.units(), plan, allow_exclusions)
            .context("Generated plan does not fit the current changes")?;

        match self.save {
            Some(path) => {
                validated.plan().save_to_file(&path)?;
                println!(
                    "💾 Plan with {} proposal(s) saved to {}",
                    validated.plan().len(),
                    path.display()
                );
            }
            None => print!("{}", to_yaml(validated.plan())?),
        }
        Ok(())
    }
}
