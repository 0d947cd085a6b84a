//! `validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::Snapshot;
use crate::data::validation::format_ids;
use crate::data::{validate, CommitPlan, ValidatedPlan};

/// Checks a plan file against the current working tree.
#[derive(Parser)]
pub struct ValidateCommand {
    /// YAML plan file to check.
    pub plan: PathBuf,

    /// Accepts plans that leave some change units uncommitted.
    #[arg(long)]
    pub allow_exclusions: bool,
}

impl ValidateCommand {
    /// Executes the validate command.
    pub fn execute(self) -> Result<()> {
        let snapshot = Snapshot::take()?;
        let plan = CommitPlan::load_from_file(&self.plan)?;
        let allow_exclusions = self.allow_exclusions || snapshot.config.allow_exclusions;

        let validated = validate(snapshot.changes.units(), plan, allow_exclusions)
            .with_context(|| format!("Plan {} is not valid", self.plan.display()))?;
        print!("{}", describe(&validated, snapshot.changes.len()));
        Ok(())
    }
}

/// Human-readable verdict for a plan that passed validation.
pub(crate) fn describe(validated: &ValidatedPlan, unit_count: usize) -> String {
    let plan = validated.plan();
    let mut text = format!(
        "✅ Plan is valid: {} proposal(s) over {} change unit(s)\n",
        plan.len(),
        unit_count
    );
    for (index, proposal) in plan.proposals.iter().enumerate() {
        text.push_str(&format!(
            "   {}. {} [{}]\n",
            index + 1,
            proposal.subject(),
            format_ids(&proposal.unit_ids)
        ));
    }
    if !validated.excluded().is_empty() {
        text.push_str(&format!(
            "   Left uncommitted: {}\n",
            format_ids(validated.excluded())
        ));
    }
    text
}
