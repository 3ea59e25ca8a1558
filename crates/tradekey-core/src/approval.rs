//! Approval status snapshot.

use crate::chain::ApprovalRequirement;

/// Result of checking a single requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalCheck {
    pub requirement: ApprovalRequirement,
    pub approved: bool,
}

/// Approval state of a smart wallet, in requirement-table order.
///
/// Read fresh from chain on every check; never cached across checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalStatus {
    checks: Vec<ApprovalCheck>,
}

impl ApprovalStatus {
    pub fn new(checks: Vec<ApprovalCheck>) -> Self {
        Self { checks }
    }

    pub fn checks(&self) -> &[ApprovalCheck] {
        &self.checks
    }

    /// True when every requirement is satisfied.
    #[must_use]
    pub fn all_approved(&self) -> bool {
        self.checks.iter().all(|c| c.approved)
    }

    /// Unsatisfied requirements, in table order.
    pub fn missing(&self) -> impl Iterator<Item = &ApprovalRequirement> {
        self.checks
            .iter()
            .filter(|c| !c.approved)
            .map(|c| &c.requirement)
    }

    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.missing().count()
    }
}
