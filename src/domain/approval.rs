//! Contribution approval states and the transitions between them.
//!
//! The valid transitions are:
//! - Pending → Approved (approve)
//! - Pending → Rejected (reject)
//! - Rejected → Pending (resubmit)
//! - Approved | Rejected → Acknowledged (acknowledge)
//!
//! Anything else is an invalid transition and leaves the row unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Review state of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    /// Submitted and waiting for an admin decision.
    Pending,
    /// Accepted by an admin; the amount counts toward the case total.
    Approved,
    /// Refused by an admin; the donor may resubmit proof.
    Rejected,
    /// The donor has dismissed the decision.
    Acknowledged,
}

impl ApprovalState {
    /// Returns the string representation stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Acknowledged => "acknowledged",
        }
    }

    /// Parses a status from its database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "acknowledged" => Some(Self::Acknowledged),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action that moves a contribution between approval states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    /// Admin accepts a pending contribution.
    Approve,
    /// Admin refuses a pending contribution.
    Reject,
    /// Donor sends new proof for a rejected contribution.
    Resubmit,
    /// Donor dismisses an approved or rejected decision.
    Acknowledge,
}

impl ApprovalAction {
    /// States from which this action is allowed.
    #[must_use]
    pub const fn allowed_from(&self) -> &'static [ApprovalState] {
        match self {
            Self::Approve | Self::Reject => &[ApprovalState::Pending],
            Self::Resubmit => &[ApprovalState::Rejected],
            Self::Acknowledge => &[ApprovalState::Approved, ApprovalState::Rejected],
        }
    }

    /// State the contribution ends up in after this action.
    #[must_use]
    pub const fn target(&self) -> ApprovalState {
        match self {
            Self::Approve => ApprovalState::Approved,
            Self::Reject => ApprovalState::Rejected,
            Self::Resubmit => ApprovalState::Pending,
            Self::Acknowledge => ApprovalState::Acknowledged,
        }
    }

    /// Short verb used in logs and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Resubmit => "resubmit",
            Self::Acknowledge => "acknowledge",
        }
    }

    /// Returns `true` if the action may be applied to a contribution in `from`.
    #[must_use]
    pub fn is_allowed_from(&self, from: ApprovalState) -> bool {
        self.allowed_from().contains(&from)
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
