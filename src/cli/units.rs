//! `units` command.

use anyhow::Result;
use clap::Parser;

use crate::cli::Snapshot;
use crate::git::ChangeUnit;

/// Lists the change units of the working tree.
#[derive(Parser)]
pub struct UnitsCommand {
    /// Prints each unit's patch text below its summary line.
    #[arg(long)]
    pub diff: bool,
}

impl UnitsCommand {
    /// Executes the units command.
    pub fn execute(self) -> Result<()> {
        let snapshot = Snapshot::take()?;
        if snapshot.changes.is_empty() {
            println!("✓ Working directory is clean");
            return Ok(());
        }

        for unit in snapshot.changes.units() {
            println!("{}", unit_line(unit));
            if self.diff {
                print!("{}", unit.patch_text());
                println!();
            }
        }
        Ok(())
    }
}

/// One-line summary: id, status code, path and line counts.
fn unit_line(unit: &ChangeUnit) -> String {
    let path = match &unit.old_path {
        Some(old) if old != &unit.file_path => format!("{old} -> {}", unit.file_path),
        _ => unit.file_path.clone(),
    };
    format!(
        "{:>4}  {}  {path}  +{} -{}",
        unit.id,
        unit.change_kind.status_code(),
        unit.added_lines(),
        unit.removed_lines()
    )
}
