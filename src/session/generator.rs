//! Capability boundary for whatever produces commit plans.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Result;
use tracing::debug;

use crate::data::{CommitPlan, ProposalContext};

/// Produces a commit plan for a proposal context.
///
/// The session only ever sees the returned plan through validation, so any
/// generator (model-backed, heuristic, hand-written) can satisfy it.
pub trait PlanGenerator: Send + Sync {
    /// Generates a plan for the given context.
    fn generate_plan<'a>(
        &'a self,
        context: &'a ProposalContext,
    ) -> Pin<Box<dyn Future<Output = Result<CommitPlan>> + Send + 'a>>;
}

/// Reads a prepared plan from a YAML file.
#[derive(Debug, Clone)]
pub struct FilePlanGenerator {
    path: PathBuf,
}

impl FilePlanGenerator {
    /// Creates a generator reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlanGenerator for FilePlanGenerator {
    fn generate_plan<'a>(
        &'a self,
        context: &'a ProposalContext,
    ) -> Pin<Box<dyn Future<Output = Result<CommitPlan>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                path = %self.path.display(),
                units = context.unit_ids.len(),
                "Loading commit plan from file"
            );
            CommitPlan::load_from_file(&self.path)
        })
    }
}
