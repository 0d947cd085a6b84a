//! Structural checks of a commit plan against the change units it was
//! computed for.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::data::plan::CommitPlan;
use crate::git::{ChangeUnit, UnitId};

/// Why a plan was rejected. Proposal numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A proposal names a unit that is not in the snapshot.
    #[error("proposal {proposal} references unknown change unit {unit}")]
    UnknownUnitReference {
        /// Offending proposal.
        proposal: usize,
        /// Referenced id.
        unit: UnitId,
    },

    /// A unit is assigned more than once.
    #[error("change unit {unit} is assigned to proposal {first} and proposal {second}")]
    DuplicateAssignment {
        /// Assigned id.
        unit: UnitId,
        /// Proposal that claimed it first.
        first: usize,
        /// Proposal that claimed it again (may equal `first`).
        second: usize,
    },

    /// Units are left out while exclusions are not allowed.
    #[error("plan leaves change units unassigned: {}", format_ids(.missing))]
    IncompletePartition {
        /// Ids no proposal references.
        missing: Vec<UnitId>,
    },

    /// A proposal has no units.
    #[error("proposal {proposal} has no change units")]
    EmptyProposal {
        /// Offending proposal.
        proposal: usize,
    },

    /// A proposal has a blank message.
    #[error("proposal {proposal} has an empty commit message")]
    EmptyMessage {
        /// Offending proposal.
        proposal: usize,
    },
}

/// Renders ids as a comma-separated list.
pub fn format_ids(ids: &[UnitId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A plan that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedPlan {
    plan: CommitPlan,
    excluded: Vec<UnitId>,
}

impl ValidatedPlan {
    /// The validated plan.
    pub fn plan(&self) -> &CommitPlan {
        &self.plan
    }

    /// Units intentionally left pending, in id order. Always empty when
    /// exclusions were disallowed.
    pub fn excluded(&self) -> &[UnitId] {
        &self.excluded
    }

    /// Splits into the plan and the excluded ids.
    pub fn into_parts(self) -> (CommitPlan, Vec<UnitId>) {
        (self.plan, self.excluded)
    }
}

/// Checks that `plan` is a partition of `units` (or of a subset of them
/// when `allow_exclusions` is set).
///
/// Checks run in a fixed order and the first violation is returned:
/// unknown ids, duplicate assignments, missing units, then empty proposals
/// and messages.
pub fn validate(
    units: &[ChangeUnit],
    plan: CommitPlan,
    allow_exclusions: bool,
) -> Result<ValidatedPlan, ValidationError> {
    let known: BTreeSet<UnitId> = units.iter().map(|u| u.id).collect();

    for (index, proposal) in plan.proposals.iter().enumerate() {
        if let Some(&unit) = proposal.unit_ids.iter().find(|id| !known.contains(id)) {
            return Err(ValidationError::UnknownUnitReference {
                proposal: index + 1,
                unit,
            });
        }
    }

    let mut owner: BTreeMap<UnitId, usize> = BTreeMap::new();
    for (index, proposal) in plan.proposals.iter().enumerate() {
        for &unit in &proposal.unit_ids {
            if let Some(&first) = owner.get(&unit) {
                return Err(ValidationError::DuplicateAssignment {
                    unit,
                    first,
                    second: index + 1,
                });
            }
            owner.insert(unit, index + 1);
        }
    }

    let unassigned: Vec<UnitId> = known
        .iter()
        .filter(|id| !owner.contains_key(id))
        .copied()
        .collect();
    if !allow_exclusions && !unassigned.is_empty() {
        return Err(ValidationError::IncompletePartition {
            missing: unassigned,
        });
    }

    for (index, proposal) in plan.proposals.iter().enumerate() {
        if proposal.unit_ids.is_empty() {
            return Err(ValidationError::EmptyProposal {
                proposal: index + 1,
            });
        }
        if proposal.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage {
                proposal: index + 1,
            });
        }
    }

    Ok(ValidatedPlan {
        plan,
        excluded: unassigned,
    })
}
