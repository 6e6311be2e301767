//! Contribution and approval DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CaseId, ContributionRecord, Recalculation};
use crate::service::{SubmitContribution, TransitionOutcome};

/// Request body for `POST /contributions`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitContributionRequest {
    /// Case to contribute to.
    pub case_id: CaseId,
    /// Amount, as a JSON string or number. Must be positive.
    pub amount: Decimal,
    /// Payment method label (e.g. `"bank_transfer"`).
    pub payment_method: String,
    /// Proof-of-payment URL.
    #[serde(default)]
    pub proof_url: Option<String>,
    /// Hide the donor's identity on the contribution.
    #[serde(default)]
    pub anonymous: bool,
}

impl From<SubmitContributionRequest> for SubmitContribution {
    fn from(req: SubmitContributionRequest) -> Self {
        Self {
            case_id: req.case_id,
            amount: req.amount,
            payment_method: req.payment_method,
            proof_url: req.proof_url,
            anonymous: req.anonymous,
        }
    }
}

/// Request body for `POST /contributions/{id}/reject`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    /// Why the contribution was rejected (e.g. `"insufficient_proof"`).
    pub reason: String,
    /// Optional remark for the donor.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Request body for `POST /contributions/{id}/resubmit`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResubmitRequest {
    /// URL of the new proof-of-payment file.
    pub proof_url: String,
    /// Optional reply to the admin's rejection.
    #[serde(default)]
    pub reply: Option<String>,
}

/// Response body for every contribution write.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    /// The contribution after the operation.
    pub contribution: ContributionRecord,
    /// Case total recomputation, for approve and reject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recalculation: Option<Recalculation>,
    /// Number of notifications the operation created.
    pub notifications_created: usize,
}

impl From<&TransitionOutcome> for TransitionResponse {
    fn from(outcome: &TransitionOutcome) -> Self {
        Self {
            contribution: outcome.record.clone(),
            recalculation: outcome.recalculation.clone(),
            notifications_created: outcome.notifications.len(),
        }
    }
}
