//! Contributions and their 1:1 approval rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::approval::{ApprovalAction, ApprovalState};
use super::ids::{CaseId, ContributionId, UserId};

/// A donor's pledge or payment toward a case.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Contribution {
    /// Contribution identifier.
    pub id: ContributionId,
    /// Case the contribution is made to.
    pub case_id: CaseId,
    /// Donor, or `None` for anonymous contributions.
    pub donor_id: Option<UserId>,
    /// Contributed amount, always positive.
    pub amount: Decimal,
    /// Free-form payment method (e.g. `"bank_transfer"`).
    pub payment_method: String,
    /// URL of the latest proof-of-payment file.
    pub proof_url: Option<String>,
    /// Legacy mirror of the approval status.
    pub status: ApprovalState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Review row attached to exactly one contribution.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ApprovalStatus {
    /// Row identifier.
    pub id: uuid::Uuid,
    /// Owning contribution (unique).
    pub contribution_id: ContributionId,
    /// Current review state.
    pub status: ApprovalState,
    /// Admin who made the last decision.
    pub admin_id: Option<UserId>,
    /// Set by approval and kept through acknowledgement.
    pub approved_at: Option<DateTime<Utc>>,
    /// Reason given on rejection.
    pub rejection_reason: Option<String>,
    /// Optional admin remark.
    pub admin_comment: Option<String>,
    /// Donor's reply sent with a resubmission.
    pub donor_reply: Option<String>,
    /// When the donor last replied.
    pub donor_reply_date: Option<DateTime<Utc>>,
    /// Proof URL supplied on resubmission.
    pub payment_proof_url: Option<String>,
    /// Number of resubmissions after rejection.
    pub resubmission_count: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ApprovalStatus {
    /// Returns `true` if the contribution was approved, whether or not the
    /// donor has acknowledged it since. Only these count toward the case
    /// total.
    #[must_use]
    pub fn is_credited(&self) -> bool {
        self.approved_at.is_some()
    }
}

/// A contribution joined with its approval row.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ContributionRecord {
    /// The contribution itself.
    pub contribution: Contribution,
    /// Its approval row.
    pub approval: ApprovalStatus,
}

impl ContributionRecord {
    /// Returns the current approval state.
    #[must_use]
    pub fn state(&self) -> ApprovalState {
        self.approval.status
    }

    /// Returns `true` if `user` is the (non-anonymous) donor.
    #[must_use]
    pub fn is_donor(&self, user: UserId) -> bool {
        self.contribution.donor_id == Some(user)
    }
}

/// Input for creating a contribution together with its pending approval row.
#[derive(Debug, Clone)]
pub struct NewContribution {
    /// Target case.
    pub case_id: CaseId,
    /// Donor, `None` when anonymous.
    pub donor_id: Option<UserId>,
    /// Amount, validated positive before reaching the store.
    pub amount: Decimal,
    /// Payment method label.
    pub payment_method: String,
    /// Initial proof-of-payment URL.
    pub proof_url: Option<String>,
}

/// Field changes written by a single conditional approval transition.
#[derive(Debug, Clone)]
pub struct ApprovalUpdate {
    /// The action being applied; determines allowed source states and target.
    pub action: ApprovalAction,
    /// Deciding admin (approve / reject).
    pub admin_id: Option<UserId>,
    /// Rejection reason (reject).
    pub rejection_reason: Option<String>,
    /// Admin remark (reject).
    pub admin_comment: Option<String>,
    /// Donor reply (resubmit).
    pub donor_reply: Option<String>,
    /// New proof URL (resubmit).
    pub payment_proof_url: Option<String>,
    /// Timestamp of the transition.
    pub at: DateTime<Utc>,
}

impl ApprovalUpdate {
    /// Admin approval.
    #[must_use]
    pub fn approve(admin_id: UserId) -> Self {
        Self::bare(ApprovalAction::Approve).with_admin(admin_id)
    }

    /// Admin rejection with a reason and optional comment.
    #[must_use]
    pub fn reject(admin_id: UserId, reason: String, comment: Option<String>) -> Self {
        Self {
            rejection_reason: Some(reason),
            admin_comment: comment,
            ..Self::bare(ApprovalAction::Reject).with_admin(admin_id)
        }
    }

    /// Donor resubmission with new proof.
    #[must_use]
    pub fn resubmit(proof_url: String, reply: Option<String>) -> Self {
        Self {
            payment_proof_url: Some(proof_url),
            donor_reply: reply,
            ..Self::bare(ApprovalAction::Resubmit)
        }
    }

    /// Donor acknowledgement.
    #[must_use]
    pub fn acknowledge() -> Self {
        Self::bare(ApprovalAction::Acknowledge)
    }

    fn bare(action: ApprovalAction) -> Self {
        Self {
            action,
            admin_id: None,
            rejection_reason: None,
            admin_comment: None,
            donor_reply: None,
            payment_proof_url: None,
            at: Utc::now(),
        }
    }

    fn with_admin(mut self, admin_id: UserId) -> Self {
        self.admin_id = Some(admin_id);
        self
    }

    /// Applies the update to an in-memory record. Callers must have checked
    /// that the current state allows the action.
    pub fn apply(&self, record: &mut ContributionRecord) {
        let approval = &mut record.approval;
        approval.status = self.action.target();
        approval.updated_at = self.at;
        match self.action {
            ApprovalAction::Approve => {
                approval.admin_id = self.admin_id;
                approval.approved_at = Some(self.at);
            }
            ApprovalAction::Reject => {
                approval.admin_id = self.admin_id;
                approval.rejection_reason.clone_from(&self.rejection_reason);
                approval.admin_comment.clone_from(&self.admin_comment);
            }
            ApprovalAction::Resubmit => {
                approval.payment_proof_url.clone_from(&self.payment_proof_url);
                approval.donor_reply.clone_from(&self.donor_reply);
                approval.donor_reply_date = Some(self.at);
                approval.resubmission_count = approval.resubmission_count.saturating_add(1);
                if self.payment_proof_url.is_some() {
                    record
                        .contribution
                        .proof_url
                        .clone_from(&self.payment_proof_url);
                }
            }
            ApprovalAction::Acknowledge => {}
        }
        record.contribution.status = self.action.target();
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Builds a pending record for tests.
    pub(crate) fn pending_record(case_id: CaseId, donor: Option<UserId>, amount: Decimal) -> ContributionRecord {
        let now = Utc::now();
        let id = ContributionId::new();
        ContributionRecord {
            contribution: Contribution {
                id,
                case_id,
                donor_id: donor,
                amount,
                payment_method: "bank_transfer".to_string(),
                proof_url: Some("https://files.example/proof-1.png".to_string()),
                status: ApprovalState::Pending,
                created_at: now,
            },
            approval: ApprovalStatus {
                id: uuid::Uuid::new_v4(),
                contribution_id: id,
                status: ApprovalState::Pending,
                admin_id: None,
                approved_at: None,
                rejection_reason: None,
                admin_comment: None,
                donor_reply: None,
                donor_reply_date: None,
                payment_proof_url: None,
                resubmission_count: 0,
                created_at: now,
                updated_at: now,
            },
        }
    }
}
