//! Plans, validation, proposal context and YAML serialization.

pub mod context;
pub mod plan;
pub mod validation;
pub mod yaml;

pub use context::{ContextFormatter, ProposalContext};
pub use plan::{CommitPlan, CommitProposal};
pub use validation::{validate, ValidatedPlan, ValidationError};
pub use yaml::*;
