//! # git-regroup
//!
//! Splits the uncommitted changes of a git working tree into a sequence of
//! coherent commits.
//!
//! The working-tree diff is decomposed into addressable change units
//! ([`git::decompose`]). A commit plan, usually proposed by an AI model,
//! assigns those units to commits; it is checked with
//! [`data::validate`] and then applied proposal by proposal through a
//! [`session::PlanSession`], which stages exactly the chosen units before
//! each commit.
//!
//! ## Quick Start
//!
//! ```rust
//! use git_regroup::data::{CommitPlan, CommitProposal};
//! use git_regroup::session::{plan_session, SessionState};
//!
//! let diff = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-a\n+b\n";
//! let plan = CommitPlan::new(vec![CommitProposal::new("fix: update a", [1])]);
//! let session = plan_session(diff, plan, false).unwrap();
//! assert_eq!(session.state(), SessionState::Ready);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod claude;
pub mod cli;
pub mod config;
pub mod data;
pub mod git;
pub mod session;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of git-regroup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
