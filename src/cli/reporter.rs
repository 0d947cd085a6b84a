//! Terminal presentation of session progress.

use crossterm::style::Stylize;

use crate::data::validation::format_ids;
use crate::git::SHORT_HASH_LEN;
use crate::session::{PlanStatus, SessionState, StatusReporter};

/// Prints newly created commits and state transitions as they happen.
#[derive(Debug, Default)]
pub struct TerminalReporter {
    announced: usize,
    last_state: Option<SessionState>,
}

impl TerminalReporter {
    /// Creates a reporter that has announced nothing yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusReporter for TerminalReporter {
    fn report(&mut self, status: &PlanStatus) {
        for commit in status.applied.iter().skip(self.announced) {
            let subject = commit.message.lines().next().unwrap_or_default();
            println!(
                "✅ [{}/{}] {} {}",
                commit.position,
                status.total,
                short_id(&commit.commit_id).yellow(),
                subject.bold()
            );
        }
        self.announced = status.applied.len();

        if self.last_state == Some(status.state) {
            return;
        }
        self.last_state = Some(status.state);
        match status.state {
            SessionState::Halted => {
                let reason = status.last_error.as_deref().unwrap_or("unknown failure");
                eprintln!("{} {reason}", "❌ Halted:".red().bold());
            }
            SessionState::Aborted => {
                println!("{}", "⏹  Stopped; commits already created are kept".yellow());
            }
            SessionState::Done if status.total > 0 => {
                println!("{}", "✨ All proposals applied".green().bold());
            }
            _ => {}
        }
    }
}

fn short_id(commit_id: &str) -> &str {
    commit_id.get(..SHORT_HASH_LEN).unwrap_or(commit_id)
}

/// Plain-text overview of a session: what was committed, what is pending
/// and what the plan leaves out.
pub fn render_summary(status: &PlanStatus) -> String {
    let mut text = format!(
        "Session {}: {} of {} proposal(s) applied\n",
        status.state,
        status.applied.len(),
        status.total
    );

    if !status.applied.is_empty() {
        text.push_str("Committed:\n");
        for commit in &status.applied {
            text.push_str(&format!(
                "  {}. {} {} [{}]\n",
                commit.position,
                short_id(&commit.commit_id),
                commit.message.lines().next().unwrap_or_default(),
                format_ids(&commit.unit_ids)
            ));
        }
    }

    if !status.remaining.is_empty() {
        text.push_str("Pending:\n");
        for proposal in &status.remaining {
            text.push_str(&format!(
                "  {}. {} [{}]\n",
                proposal.position,
                proposal.message.lines().next().unwrap_or_default(),
                format_ids(&proposal.unit_ids)
            ));
            if !proposal.rationale.is_empty() {
                text.push_str(&format!("     {}\n", proposal.rationale));
            }
        }
    }

    if !status.excluded.is_empty() {
        text.push_str(&format!(
            "Left uncommitted: {}\n",
            format_ids(&status.excluded)
        ));
    }
    if let Some(error) = &status.last_error {
        text.push_str(&format!("Last error: {error}\n"));
    }
    text
}
