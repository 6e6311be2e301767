//! Contribution approval workflow.
//!
//! ```text
//! pending  --approve-->     approved
//! pending  --reject-->      rejected
//! rejected --resubmit-->    pending
//! approved --acknowledge--> acknowledged
//! rejected --acknowledge--> acknowledged
//! ```
//!
//! Every transition is a single conditional write in the store, so two
//! admins approving the same contribution at once produce exactly one
//! approval, one notification and one credit to the case total. The loser
//! gets [`AppError::InvalidState`].
//!
//! Side effects run after the write: the case total is recomputed after
//! approve and reject, and notifications are emitted through the
//! [`NotificationEmitter`]. Every created notification is returned in the
//! [`TransitionOutcome`] so the caller can hand it to realtime delivery.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::case_aggregate::CaseAggregateUpdater;
use super::notification_emitter::NotificationEmitter;
use crate::domain::{
    ApprovalUpdate, CaseId, CaseStatus, ContributionId, ContributionRecord,
    NewContribution, NewNotification, Notification, NotificationKind, Recalculation, Role, UserId,
};
use crate::error::AppError;
use crate::persistence::Store;

/// Decimal places the `NUMERIC(14, 2)` amount columns keep.
const AMOUNT_SCALE: u32 = 2;

/// Exclusive upper bound of an amount (12 integer digits).
const AMOUNT_LIMIT: i64 = 1_000_000_000_000;

/// Checks that `amount` is positive and fits the stored precision exactly,
/// returning it normalized.
fn validated_amount(amount: Decimal) -> Result<Decimal, AppError> {
    let amount = amount.normalize();
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    if amount.scale() > AMOUNT_SCALE {
        return Err(AppError::Validation(format!(
            "amount {amount} has more than {AMOUNT_SCALE} decimal places"
        )));
    }
    if amount >= Decimal::from(AMOUNT_LIMIT) {
        return Err(AppError::Validation(format!(
            "amount must be below {AMOUNT_LIMIT}"
        )));
    }
    Ok(amount)
}

/// Input for [`ApprovalWorkflow::submit`].
#[derive(Debug, Clone)]
pub struct SubmitContribution {
    /// Case to contribute to.
    pub case_id: CaseId,
    /// Contributed amount; must be positive.
    pub amount: Decimal,
    /// Payment method label.
    pub payment_method: String,
    /// Proof-of-payment URL, if already uploaded.
    pub proof_url: Option<String>,
    /// Submit without attaching the donor's identity.
    pub anonymous: bool,
}

/// Result of a workflow operation.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The contribution after the operation.
    pub record: ContributionRecord,
    /// Case total recomputation, for approve and reject.
    pub recalculation: Option<Recalculation>,
    /// Notifications created by the operation.
    pub notifications: Vec<Notification>,
}

/// Orchestrates contribution state transitions and their side effects.
#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    store: Arc<dyn Store>,
    emitter: NotificationEmitter,
    aggregate: CaseAggregateUpdater,
}

impl ApprovalWorkflow {
    /// Creates a workflow over the given store and collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        emitter: NotificationEmitter,
        aggregate: CaseAggregateUpdater,
    ) -> Self {
        Self {
            store,
            emitter,
            aggregate,
        }
    }

    /// Creates a pending contribution and notifies the donor, the admins,
    /// and the case creator.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a non-positive amount, one with more
    ///   than two decimal places or 12 integer digits, an empty payment
    ///   method, or a case that is not published.
    /// - [`AppError::CaseNotFound`] if the case does not exist.
    /// - [`AppError::Persistence`] on store failure.
    pub async fn submit(
        &self,
        donor: UserId,
        input: SubmitContribution,
    ) -> Result<TransitionOutcome, AppError> {
        let amount = validated_amount(input.amount)?;
        let payment_method = input.payment_method.trim();
        if payment_method.is_empty() {
            return Err(AppError::Validation("payment_method is required".to_string()));
        }
        let case = self.aggregate.get(input.case_id).await?;
        if case.status != CaseStatus::Published {
            return Err(AppError::Validation(format!(
                "case {} is {} and does not accept contributions",
                case.id, case.status
            )));
        }

        let donor_id = (!input.anonymous).then_some(donor);
        let record = self
            .store
            .insert_contribution(NewContribution {
                case_id: case.id,
                donor_id,
                amount,
                payment_method: payment_method.to_string(),
                proof_url: input.proof_url,
            })
            .await?;
        let contribution = &record.contribution;
        tracing::info!(
            contribution_id = %contribution.id,
            case_id = %case.id,
            amount = %contribution.amount,
            "contribution submitted"
        );

        let data = serde_json::json!({
            "contribution_id": contribution.id,
            "case_id": case.id,
            "amount": contribution.amount.to_string(),
        });
        let mut recipients = Vec::new();
        if let Some(donor) = donor_id {
            recipients.push((
                donor,
                NotificationKind::ContributionPending,
                "Contribution received".to_string(),
                format!(
                    "Your contribution of {} to {} is awaiting review.",
                    contribution.amount,
                    case.display_title()
                ),
            ));
        }
        let admin_roles: Vec<String> = Role::ADMINS.iter().map(|r| r.as_str().to_string()).collect();
        for admin in self.store.user_ids_with_roles(&admin_roles).await? {
            recipients.push((
                admin,
                NotificationKind::ContributionPending,
                "New contribution to review".to_string(),
                format!(
                    "A contribution of {} to {} awaits approval.",
                    contribution.amount,
                    case.display_title()
                ),
            ));
        }
        if let Some(creator) = case.created_by {
            recipients.push((
                creator,
                NotificationKind::CaseContribution,
                "New contribution".to_string(),
                format!(
                    "{} received a contribution of {}.",
                    case.display_title(),
                    contribution.amount
                ),
            ));
        }

        let mut notifications = Vec::new();
        for (recipient_id, kind, title, message) in recipients {
            let emitted = self
                .emitter
                .emit(NewNotification {
                    recipient_id,
                    kind,
                    title,
                    message,
                    data: data.clone(),
                })
                .await?;
            notifications.extend(emitted.created());
        }

        Ok(TransitionOutcome {
            record,
            recalculation: None,
            notifications,
        })
    }

    /// Loads a contribution. Donors may read their own, admins any.
    ///
    /// # Errors
    ///
    /// - [`AppError::ContributionNotFound`] if it does not exist.
    /// - [`AppError::Forbidden`] if the caller is neither its donor nor an
    ///   admin.
    pub async fn get(
        &self,
        id: ContributionId,
        caller: UserId,
        is_admin: bool,
    ) -> Result<ContributionRecord, AppError> {
        let record = self.load(id).await?;
        if is_admin || record.is_donor(caller) {
            Ok(record)
        } else {
            Err(AppError::Forbidden(format!(
                "contribution {id} belongs to another donor"
            )))
        }
    }

    /// Approves a pending contribution.
    ///
    /// # Errors
    ///
    /// - [`AppError::ContributionNotFound`] if it does not exist.
    /// - [`AppError::InvalidState`] if it is not pending.
    /// - [`AppError::Persistence`] on store failure.
    pub async fn approve(
        &self,
        id: ContributionId,
        admin: UserId,
    ) -> Result<TransitionOutcome, AppError> {
        let record = self.transition(id, &ApprovalUpdate::approve(admin)).await?;
        let recalc = self.aggregate.recalculate(record.contribution.case_id).await?;
        let case = self.aggregate.get(record.contribution.case_id).await?;
        let contribution = &record.contribution;

        let mut notifications = Vec::new();
        if let Some(donor) = contribution.donor_id {
            let emitted = self
                .emitter
                .emit(NewNotification {
                    recipient_id: donor,
                    kind: NotificationKind::ContributionApproved,
                    title: "Contribution approved".to_string(),
                    message: format!(
                        "Your contribution of {} to {} has been approved. Thank you!",
                        contribution.amount,
                        case.display_title()
                    ),
                    data: serde_json::json!({
                        "contribution_id": contribution.id,
                        "case_id": case.id,
                        "amount": contribution.amount.to_string(),
                    }),
                })
                .await?;
            notifications.extend(emitted.created());
        }

        for milestone in recalc.crossed_milestones() {
            tracing::info!(case_id = %case.id, milestone, "case milestone reached");
            let data = serde_json::json!({
                "contribution_id": contribution.id,
                "case_id": case.id,
                "milestone": milestone,
            });
            let mut targets = Vec::with_capacity(2);
            if let Some(creator) = case.created_by {
                targets.push((
                    creator,
                    NotificationKind::CaseMilestone,
                    format!("{} reached {milestone}% of its goal", case.display_title()),
                ));
            }
            if let Some(donor) = contribution.donor_id {
                targets.push((
                    donor,
                    NotificationKind::CaseProgress,
                    format!(
                        "{} you supported is now {milestone}% funded",
                        case.display_title()
                    ),
                ));
            }
            for (recipient_id, kind, message) in targets {
                let emitted = self
                    .emitter
                    .emit(NewNotification {
                        recipient_id,
                        kind,
                        title: format!("{milestone}% funded"),
                        message,
                        data: data.clone(),
                    })
                    .await?;
                notifications.extend(emitted.created());
            }
        }

        Ok(TransitionOutcome {
            record,
            recalculation: Some(recalc),
            notifications,
        })
    }

    /// Rejects a pending contribution with a reason.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if `reason` is blank.
    /// - [`AppError::ContributionNotFound`] if it does not exist.
    /// - [`AppError::InvalidState`] if it is not pending.
    /// - [`AppError::Persistence`] on store failure.
    pub async fn reject(
        &self,
        id: ContributionId,
        admin: UserId,
        reason: &str,
        comment: Option<String>,
    ) -> Result<TransitionOutcome, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let record = self
            .transition(
                id,
                &ApprovalUpdate::reject(admin, reason.to_string(), comment.clone()),
            )
            .await?;
        let recalc = self.aggregate.recalculate(record.contribution.case_id).await?;
        let contribution = &record.contribution;

        let mut notifications = Vec::new();
        if let Some(donor) = contribution.donor_id {
            let message = match &comment {
                Some(comment) => format!(
                    "Your contribution of {} was rejected: {reason}. {comment}",
                    contribution.amount
                ),
                None => format!(
                    "Your contribution of {} was rejected: {reason}.",
                    contribution.amount
                ),
            };
            let emitted = self
                .emitter
                .emit(NewNotification {
                    recipient_id: donor,
                    kind: NotificationKind::ContributionRejected,
                    title: "Contribution rejected".to_string(),
                    message,
                    data: serde_json::json!({
                        "contribution_id": contribution.id,
                        "case_id": contribution.case_id,
                        "rejection_reason": reason,
                    }),
                })
                .await?;
            notifications.extend(emitted.created());
        }

        Ok(TransitionOutcome {
            record,
            recalculation: Some(recalc),
            notifications,
        })
    }

    /// Sends new proof for a rejected contribution, putting it back into
    /// review.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if the proof URL is blank or the caller is
    ///   not the donor.
    /// - [`AppError::ContributionNotFound`] if it does not exist.
    /// - [`AppError::InvalidState`] if it is not rejected.
    /// - [`AppError::Persistence`] on store failure.
    pub async fn resubmit(
        &self,
        id: ContributionId,
        donor: UserId,
        proof_url: &str,
        reply: Option<String>,
    ) -> Result<TransitionOutcome, AppError> {
        let proof_url = proof_url.trim();
        if proof_url.is_empty() {
            return Err(AppError::Validation("proof_url is required".to_string()));
        }
        self.ensure_donor(id, donor).await?;

        let reply = reply.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let record = self
            .transition(id, &ApprovalUpdate::resubmit(proof_url.to_string(), reply))
            .await?;

        let emitted = self
            .emitter
            .emit(NewNotification {
                recipient_id: donor,
                kind: NotificationKind::ContributionPending,
                title: "Contribution resubmitted".to_string(),
                message: format!(
                    "Your contribution of {} is back under review.",
                    record.contribution.amount
                ),
                data: serde_json::json!({
                    "contribution_id": record.contribution.id,
                    "case_id": record.contribution.case_id,
                    "resubmission_count": record.approval.resubmission_count,
                }),
            })
            .await?;

        Ok(TransitionOutcome {
            record,
            recalculation: None,
            notifications: emitted.created().into_iter().collect(),
        })
    }

    /// Dismisses an approved or rejected decision.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if the caller is not the donor.
    /// - [`AppError::ContributionNotFound`] if it does not exist.
    /// - [`AppError::InvalidState`] unless it is approved or rejected.
    /// - [`AppError::Persistence`] on store failure.
    pub async fn acknowledge(
        &self,
        id: ContributionId,
        donor: UserId,
    ) -> Result<TransitionOutcome, AppError> {
        self.ensure_donor(id, donor).await?;
        let record = self.transition(id, &ApprovalUpdate::acknowledge()).await?;
        Ok(TransitionOutcome {
            record,
            recalculation: None,
            notifications: Vec::new(),
        })
    }

    async fn load(&self, id: ContributionId) -> Result<ContributionRecord, AppError> {
        self.store
            .get_contribution(id)
            .await?
            .ok_or(AppError::ContributionNotFound(id))
    }

    async fn ensure_donor(&self, id: ContributionId, caller: UserId) -> Result<(), AppError> {
        if self.load(id).await?.is_donor(caller) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "only the donor may act on contribution {id}"
            )))
        }
    }

    /// Applies the conditional write; on a miss, re-reads to tell an unknown
    /// contribution from a disallowed status.
    async fn transition(
        &self,
        id: ContributionId,
        update: &ApprovalUpdate,
    ) -> Result<ContributionRecord, AppError> {
        if let Some(record) = self.store.transition_approval(id, update).await? {
            tracing::info!(
                contribution_id = %id,
                action = %update.action,
                status = %record.state(),
                "contribution transitioned"
            );
            return Ok(record);
        }

        let current = self.load(id).await?.state();
        tracing::info!(
            contribution_id = %id,
            action = %update.action,
            %current,
            "transition refused"
        );
        Err(AppError::InvalidState {
            contribution_id: id,
            action: update.action,
            current,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ApprovalAction, ApprovalState, Case};
    use crate::persistence::memory::MemoryStore;
    use rust_decimal_macros::dec;

    struct Harness {
        store: Arc<MemoryStore>,
        workflow: ApprovalWorkflow,
        case: Case,
        creator: UserId,
        admin: UserId,
        donor: UserId,
    }

    async fn harness(target: Decimal) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let dyn_store = Arc::clone(&store) as Arc<dyn Store>;
        let emitter = NotificationEmitter::new(Arc::clone(&dyn_store));
        let aggregate = CaseAggregateUpdater::new(Arc::clone(&dyn_store));
        let workflow = ApprovalWorkflow::new(dyn_store, emitter, aggregate);

        let creator = UserId::new();
        let admin = UserId::new();
        let donor = UserId::new();
        store.insert_profile(admin, Role::Admin).await;
        store.insert_profile(donor, Role::Donor).await;
        let case = store
            .create_case("Clean water", target, CaseStatus::Published, Some(creator))
            .await;

        Harness {
            store,
            workflow,
            case,
            creator,
            admin,
            donor,
        }
    }

    impl Harness {
        async fn submit(&self, amount: Decimal) -> ContributionRecord {
            let Ok(outcome) = self
                .workflow
                .submit(
                    self.donor,
                    SubmitContribution {
                        case_id: self.case.id,
                        amount,
                        payment_method: "bank_transfer".to_string(),
                        proof_url: Some("https://files.example/proof-1.png".to_string()),
                        anonymous: false,
                    },
                )
                .await
            else {
                panic!("submit failed");
            };
            outcome.record
        }

        async fn current_amount(&self) -> Decimal {
            let Ok(Some(case)) = self.store.get_case(self.case.id).await else {
                panic!("case missing");
            };
            case.current_amount
        }

        async fn count(&self, recipient: UserId, kind: NotificationKind) -> usize {
            let Ok(all) = self.store.list_notifications(recipient, false, 1000, 0).await else {
                panic!("list failed");
            };
            all.iter().filter(|n| n.kind == kind).count()
        }
    }

    #[tokio::test]
    async fn submit_notifies_donor_admins_and_creator() {
        let h = harness(dec!(1000)).await;
        let record = h.submit(dec!(100)).await;

        assert_eq!(record.state(), ApprovalState::Pending);
        assert_eq!(h.count(h.donor, NotificationKind::ContributionPending).await, 1);
        assert_eq!(h.count(h.admin, NotificationKind::ContributionPending).await, 1);
        assert_eq!(h.count(h.creator, NotificationKind::CaseContribution).await, 1);
        assert_eq!(h.current_amount().await, dec!(0));
    }

    #[tokio::test]
    async fn submit_validates_amount_and_case() {
        let h = harness(dec!(1000)).await;
        let input = SubmitContribution {
            case_id: h.case.id,
            amount: dec!(0),
            payment_method: "cash".to_string(),
            proof_url: None,
            anonymous: false,
        };
        assert!(matches!(
            h.workflow.submit(h.donor, input.clone()).await,
            Err(AppError::Validation(_))
        ));

        let draft = h
            .store
            .create_case("Draft", dec!(10), CaseStatus::Draft, None)
            .await;
        let to_draft = SubmitContribution {
            case_id: draft.id,
            amount: dec!(5),
            ..input.clone()
        };
        assert!(matches!(
            h.workflow.submit(h.donor, to_draft).await,
            Err(AppError::Validation(_))
        ));

        let to_missing = SubmitContribution {
            case_id: CaseId::new(),
            amount: dec!(5),
            ..input
        };
        assert!(matches!(
            h.workflow.submit(h.donor, to_missing).await,
            Err(AppError::CaseNotFound(_))
        ));
        assert_eq!(h.store.notification_count().await, 0);
    }

    #[tokio::test]
    async fn approve_credits_case_and_notifies_donor() {
        let h = harness(dec!(1000)).await;
        let c1 = h.submit(dec!(100)).await;

        let Ok(outcome) = h.workflow.approve(c1.contribution.id, h.admin).await else {
            panic!("approve failed");
        };
        assert_eq!(outcome.record.state(), ApprovalState::Approved);
        assert_eq!(outcome.record.approval.admin_id, Some(h.admin));
        assert_eq!(outcome.record.contribution.status, ApprovalState::Approved);
        assert_eq!(h.current_amount().await, dec!(100));
        assert_eq!(h.count(h.donor, NotificationKind::ContributionApproved).await, 1);
    }

    #[tokio::test]
    async fn reject_keeps_amount_and_notifies_donor() {
        let h = harness(dec!(1000)).await;
        let c2 = h.submit(dec!(50)).await;

        let Ok(outcome) = h
            .workflow
            .reject(c2.contribution.id, h.admin, "insufficient_proof", None)
            .await
        else {
            panic!("reject failed");
        };
        assert_eq!(outcome.record.state(), ApprovalState::Rejected);
        assert_eq!(
            outcome.record.approval.rejection_reason.as_deref(),
            Some("insufficient_proof")
        );
        assert_eq!(h.current_amount().await, dec!(0));
        assert_eq!(h.count(h.donor, NotificationKind::ContributionRejected).await, 1);
    }

    #[tokio::test]
    async fn resubmit_after_reject_reuses_pending_notice() {
        let h = harness(dec!(1000)).await;
        let c2 = h.submit(dec!(50)).await;
        let id = c2.contribution.id;
        let Ok(_) = h.workflow.reject(id, h.admin, "insufficient_proof", None).await else {
            panic!("reject failed");
        };

        let Ok(outcome) = h
            .workflow
            .resubmit(id, h.donor, "https://files.example/proof-2.png", None)
            .await
        else {
            panic!("resubmit failed");
        };
        assert_eq!(outcome.record.state(), ApprovalState::Pending);
        assert_eq!(outcome.record.approval.resubmission_count, 1);
        assert_eq!(
            outcome.record.contribution.proof_url.as_deref(),
            Some("https://files.example/proof-2.png")
        );
        assert!(outcome.notifications.is_empty());
        assert_eq!(h.count(h.donor, NotificationKind::ContributionPending).await, 1);
        assert_eq!(h.current_amount().await, dec!(0));
    }

    #[tokio::test]
    async fn resubmit_counts_each_round() {
        let h = harness(dec!(1000)).await;
        let id = h.submit(dec!(50)).await.contribution.id;
        for round in 1..=3 {
            let Ok(_) = h.workflow.reject(id, h.admin, "blurry", None).await else {
                panic!("reject failed");
            };
            let Ok(outcome) = h
                .workflow
                .resubmit(id, h.donor, "https://files.example/again.png", None)
                .await
            else {
                panic!("resubmit failed");
            };
            assert_eq!(outcome.record.approval.resubmission_count, round);
        }
    }

    #[tokio::test]
    async fn second_approve_is_invalid_state() {
        let h = harness(dec!(1000)).await;
        let id = h.submit(dec!(50)).await.contribution.id;
        let other_admin = UserId::new();

        let Ok(_) = h.workflow.approve(id, h.admin).await else {
            panic!("first approve failed");
        };
        let second = h.workflow.approve(id, other_admin).await;
        assert!(matches!(
            second,
            Err(AppError::InvalidState {
                action: ApprovalAction::Approve,
                current: ApprovalState::Approved,
                ..
            })
        ));
        assert_eq!(h.current_amount().await, dec!(50));
        assert_eq!(h.count(h.donor, NotificationKind::ContributionApproved).await, 1);

        let Ok(record) = h.workflow.get(id, h.admin, true).await else {
            panic!("get failed");
        };
        assert_eq!(record.approval.admin_id, Some(h.admin));
    }

    #[tokio::test]
    async fn concurrent_approvals_credit_once() {
        let h = harness(dec!(1000)).await;
        let id = h.submit(dec!(100)).await.contribution.id;

        let a = h.workflow.clone();
        let b = h.workflow.clone();
        let (admin_a, admin_b) = (h.admin, UserId::new());
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.approve(id, admin_a).await }),
            tokio::spawn(async move { b.approve(id, admin_b).await }),
        );
        let (Ok(ra), Ok(rb)) = (ra, rb) else {
            panic!("task panicked");
        };
        assert_eq!(usize::from(ra.is_ok()) + usize::from(rb.is_ok()), 1);
        assert_eq!(h.current_amount().await, dec!(100));
        assert_eq!(h.count(h.donor, NotificationKind::ContributionApproved).await, 1);
    }

    #[tokio::test]
    async fn illegal_transitions_leave_row_unchanged() {
        let h = harness(dec!(1000)).await;
        let id = h.submit(dec!(10)).await.contribution.id;

        assert!(matches!(
            h.workflow.acknowledge(id, h.donor).await,
            Err(AppError::InvalidState { .. })
        ));
        assert!(matches!(
            h.workflow.resubmit(id, h.donor, "https://x.example/p.png", None).await,
            Err(AppError::InvalidState { .. })
        ));

        let Ok(_) = h.workflow.approve(id, h.admin).await else {
            panic!("approve failed");
        };
        assert!(matches!(
            h.workflow.reject(id, h.admin, "late", None).await,
            Err(AppError::InvalidState { .. })
        ));
        let Ok(ack) = h.workflow.acknowledge(id, h.donor).await else {
            panic!("acknowledge failed");
        };
        assert_eq!(ack.record.state(), ApprovalState::Acknowledged);
        assert!(ack.notifications.is_empty());

        for result in [
            h.workflow.approve(id, h.admin).await,
            h.workflow.acknowledge(id, h.donor).await,
        ] {
            assert!(matches!(result, Err(AppError::InvalidState { .. })));
        }
        let Ok(record) = h.workflow.get(id, h.donor, false).await else {
            panic!("get failed");
        };
        assert_eq!(record.state(), ApprovalState::Acknowledged);
        assert_eq!(h.current_amount().await, dec!(10));
    }

    #[tokio::test]
    async fn validation_happens_before_any_write() {
        let h = harness(dec!(1000)).await;
        let id = h.submit(dec!(10)).await.contribution.id;

        assert!(matches!(
            h.workflow.reject(id, h.admin, "   ", None).await,
            Err(AppError::Validation(_))
        ));
        let Ok(_) = h.workflow.reject(id, h.admin, "blurry", None).await else {
            panic!("reject failed");
        };
        let stranger = UserId::new();
        assert!(matches!(
            h.workflow.resubmit(id, stranger, "https://x.example/p.png", None).await,
            Err(AppError::Validation(_))
        ));
        let Ok(record) = h.workflow.get(id, h.admin, true).await else {
            panic!("get failed");
        };
        assert_eq!(record.state(), ApprovalState::Rejected);
        assert_eq!(record.approval.resubmission_count, 0);
    }

    #[tokio::test]
    async fn unknown_contribution_is_not_found() {
        let h = harness(dec!(1000)).await;
        assert!(matches!(
            h.workflow.approve(ContributionId::new(), h.admin).await,
            Err(AppError::ContributionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_is_limited_to_donor_and_admins() {
        let h = harness(dec!(1000)).await;
        let id = h.submit(dec!(10)).await.contribution.id;
        assert!(h.workflow.get(id, h.donor, false).await.is_ok());
        assert!(matches!(
            h.workflow.get(id, UserId::new(), false).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn submit_rejects_amounts_the_ledger_cannot_hold() {
        let h = harness(dec!(1000)).await;
        for amount in [dec!(0.004), dec!(10.125), dec!(1000000000000), dec!(-5)] {
            let input = SubmitContribution {
                case_id: h.case.id,
                amount,
                payment_method: "cash".to_string(),
                proof_url: None,
                anonymous: false,
            };
            assert!(
                matches!(h.workflow.submit(h.donor, input).await, Err(AppError::Validation(_))),
                "{amount} should be rejected"
            );
        }
        assert_eq!(h.store.notification_count().await, 0);

        // Trailing zeros are not extra precision.
        let record = h.submit(dec!(999999999999.990)).await;
        assert_eq!(record.contribution.amount, dec!(999999999999.99));
    }

    #[tokio::test]
    async fn acknowledged_approval_still_counts_toward_total() {
        let h = harness(dec!(400)).await;
        let first = h.submit(dec!(100)).await.contribution.id;
        let second = h.submit(dec!(50)).await.contribution.id;

        let Ok(_) = h.workflow.approve(first, h.admin).await else {
            panic!("approve failed");
        };
        let Ok(acked) = h.workflow.acknowledge(first, h.donor).await else {
            panic!("acknowledge failed");
        };
        assert_eq!(acked.record.state(), ApprovalState::Acknowledged);
        assert_eq!(h.current_amount().await, dec!(100));

        let Ok(outcome) = h.workflow.approve(second, h.admin).await else {
            panic!("approve failed");
        };
        let Some(recalc) = outcome.recalculation else {
            panic!("approve should recalculate");
        };
        assert_eq!(recalc.previous, dec!(100));
        assert_eq!(recalc.current, dec!(150));
        assert_eq!(h.current_amount().await, dec!(150));

        // 25% was crossed by the first approval only.
        assert_eq!(h.count(h.creator, NotificationKind::CaseMilestone).await, 1);
        assert_eq!(h.count(h.donor, NotificationKind::CaseProgress).await, 1);
    }

    #[tokio::test]
    async fn crossing_milestones_notifies_creator_and_donor() {
        let h = harness(dec!(200)).await;
        let first = h.submit(dec!(60)).await.contribution.id;
        let second = h.submit(dec!(100)).await.contribution.id;

        let Ok(outcome) = h.workflow.approve(first, h.admin).await else {
            panic!("approve failed");
        };
        assert_eq!(
            outcome.recalculation.map(|r| r.crossed_milestones()),
            Some(vec![25])
        );
        let Ok(_) = h.workflow.approve(second, h.admin).await else {
            panic!("approve failed");
        };

        // 30% then 80%: 25, 50, 75 each reached once.
        assert_eq!(h.count(h.creator, NotificationKind::CaseMilestone).await, 3);
        assert_eq!(h.count(h.donor, NotificationKind::CaseProgress).await, 3);
    }

    #[tokio::test]
    async fn notification_failure_surfaces_after_status_write() {
        let h = harness(dec!(1000)).await;
        let id = h.submit(dec!(40)).await.contribution.id;

        h.store.set_fail_notification_inserts(true);
        assert!(matches!(
            h.workflow.approve(id, h.admin).await,
            Err(AppError::Persistence(_))
        ));
        h.store.set_fail_notification_inserts(false);

        // The conditional write is the commit point; the total was recomputed
        // before the failed insert.
        let Ok(record) = h.workflow.get(id, h.admin, true).await else {
            panic!("get failed");
        };
        assert_eq!(record.state(), ApprovalState::Approved);
        assert_eq!(h.current_amount().await, dec!(40));
    }
}
