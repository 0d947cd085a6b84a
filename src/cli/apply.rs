//! `apply` command.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use crate::cli::reporter::{render_summary, TerminalReporter};
use crate::cli::Snapshot;
use crate::data::validation::format_ids;
use crate::git::{GitRepository, RepositoryBackend};
use crate::session::{plan_session, Directive, PlanSession, PlanStatus, SessionError, SessionState};

/// Applies a commit plan to the working tree.
#[derive(Parser)]
pub struct ApplyCommand {
    /// YAML plan to apply; without it a plan is generated by the AI.
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Applies every proposal without prompting.
    #[arg(long)]
    pub all: bool,

    /// Lets the plan leave some change units uncommitted.
    #[arg(long)]
    pub allow_exclusions: bool,

    /// AI model to use when generating the plan.
    #[arg(long)]
    pub model: Option<String>,
}

impl ApplyCommand {
    /// Executes the apply command.
    pub async fn execute(self) -> Result<()> {
        let snapshot = Snapshot::take()?;
        if snapshot.changes.is_empty() {
            println!("✓ Working directory is clean");
            return Ok(());
        }

        let allow_exclusions = self.allow_exclusions || snapshot.config.allow_exclusions;
        let plan = snapshot
            .obtain_plan(self.plan.as_deref(), self.model.clone(), allow_exclusions)
            .await?;
        let mut session = plan_session(&snapshot.diff, plan, allow_exclusions)
            .context("Plan does not fit the current changes")?
            .with_reporter(Box::new(TerminalReporter::new()));

        let abort = session.abort_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping after the current proposal (Ctrl-C again exits now)");
                abort.request();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        });

        println!(
            "📋 Plan has {} proposal(s) over {} change unit(s)",
            session.status().total,
            session.changes().len()
        );

        let outcome = if self.all {
            session
                .execute(Directive::ApplyAll, &snapshot.repo)
                .map(|_| ())
                .map_err(anyhow::Error::from)
        } else {
            run_interactive(
                &mut session,
                &snapshot.repo,
                io::stdin().is_terminal(),
                &mut io::stdin().lock(),
            )
        };
        interrupt.abort();

        report_outcome(&snapshot.repo, &session.status())?;
        outcome
    }
}

/// Drives a session from user choices read from `reader`.
///
/// `is_terminal` and `reader` are injected so tests can script the
/// conversation.
pub(crate) fn run_interactive(
    session: &mut PlanSession,
    backend: &dyn RepositoryBackend,
    is_terminal: bool,
    reader: &mut dyn BufRead,
) -> Result<()> {
    if !is_terminal {
        eprintln!("warning: stdin is not interactive, use --all to apply without prompting");
        return Ok(());
    }

    let abort = session.abort_handle();
    loop {
        if abort.is_requested() {
            session.abort();
            return Ok(());
        }

        let halted = match session.state() {
            SessionState::Done | SessionState::Aborted => return Ok(()),
            SessionState::Halted => {
                print!("❓ [R]etry, [S]ummary, or [Q]uit? [r/s/q] ");
                true
            }
            _ => {
                announce_next(&session.status());
                print!("❓ [N]ext, [A]ll, [S]ummary, or [Q]uit? [N/a/s/q] ");
                false
            }
        };
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes = reader.read_line(&mut input)?;
        if bytes == 0 {
            eprintln!("warning: stdin closed, stopping");
            session.abort();
            return Ok(());
        }

        let outcome = match input.trim().to_lowercase().as_str() {
            "n" | "next" | "" if !halted => session.execute(Directive::ApplyNext, backend),
            "a" | "all" if !halted => session.execute(Directive::ApplyAll, backend),
            "r" | "retry" if halted => retry(session, backend),
            "s" | "summary" => {
                print!("{}", render_summary(&session.inspect()));
                continue;
            }
            "q" | "quit" => {
                session.execute(Directive::Abort, backend)?;
                return Ok(());
            }
            _ => {
                if halted {
                    println!("Invalid choice. Please enter 'r' to retry, 's' for a summary, or 'q' to quit.");
                } else {
                    println!("Invalid choice. Please enter 'n' for the next proposal, 'a' for all, 's' for a summary, or 'q' to quit.");
                }
                continue;
            }
        };

        if let Err(error) = outcome {
            debug!(%error, "Proposal failed");
        }
    }
}

/// Retries the failing proposal: only the commit when staging already
/// succeeded, otherwise staging and commit.
fn retry(
    session: &mut PlanSession,
    backend: &dyn RepositoryBackend,
) -> Result<PlanStatus, SessionError> {
    if matches!(session.last_error(), Some(SessionError::CommitCreation { .. })) {
        session.retry_commit(backend)
    } else {
        session.resume()?;
        session.apply_next(backend)
    }
}

fn announce_next(status: &PlanStatus) {
    if let Some(next) = status.remaining.first() {
        println!(
            "\n📦 Next [{}/{}]: {} (changes {})",
            next.position,
            status.total,
            next.message.lines().next().unwrap_or_default(),
            format_ids(&next.unit_ids)
        );
    }
}

/// Prints the final summary and whether anything is left uncommitted.
fn report_outcome(repo: &GitRepository, status: &PlanStatus) -> Result<()> {
    println!();
    print!("{}", render_summary(status));

    let remaining = repo.working_directory_status()?;
    if remaining.clean {
        println!("✓ Working directory is clean");
    } else {
        println!(
            "⚠️  {} file(s) still have uncommitted changes:",
            remaining.changes.len()
        );
        for file in &remaining.changes {
            println!("   {} {}", file.status, file.file);
        }
    }
    Ok(())
}
