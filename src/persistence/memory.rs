//! In-process store backed by `tokio::sync::RwLock`.
//!
//! [`MemoryStore`] mirrors the semantics of the PostgreSQL backend closely
//! enough for the service layer not to notice the difference: approval
//! transitions are compare-and-set under the write lock, deduplicated
//! notification kinds are checked inside the same critical section as the
//! insert, and listings are newest first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::Store;
use crate::domain::{
    ApprovalState, ApprovalStatus, ApprovalUpdate, Case, CaseId, CaseStatus, Contribution,
    ContributionId, ContributionRecord, NewContribution, NewNotification, Notification,
    NotificationId, NotificationKind, NotificationRule, Recalculation, Role, UserId,
};
use crate::error::AppError;

#[derive(Debug, Default)]
struct MemoryState {
    contributions: HashMap<ContributionId, ContributionRecord>,
    cases: HashMap<CaseId, Case>,
    // Insertion order; listings walk it backwards.
    notifications: Vec<Notification>,
    // Stored as JSON, like the `system_config` row.
    rules: serde_json::Value,
    profiles: HashMap<UserId, Role>,
}

impl MemoryState {
    fn approved_total(&self, case_id: CaseId) -> Decimal {
        self.contributions
            .values()
            .filter(|r| r.contribution.case_id == case_id && r.approval.is_credited())
            .map(|r| r.contribution.amount)
            .sum()
    }

    fn inbox(&self, recipient: UserId, unread_only: bool) -> impl Iterator<Item = &Notification> {
        self.notifications
            .iter()
            .rev()
            .filter(move |n| n.recipient_id == recipient && (!unread_only || !n.read))
    }
}

/// Store that keeps every table in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_notification_inserts: AtomicBool,
    rule_loads: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user profile with the given role.
    pub async fn insert_profile(&self, user: UserId, role: Role) {
        self.state.write().await.profiles.insert(user, role);
    }

    /// Inserts (or replaces) a case as-is.
    pub async fn insert_case(&self, case: Case) {
        self.state.write().await.cases.insert(case.id, case);
    }

    /// Creates a case with no contributions and returns it.
    pub async fn create_case(
        &self,
        title_en: &str,
        target_amount: Decimal,
        status: CaseStatus,
        created_by: Option<UserId>,
    ) -> Case {
        let now = Utc::now();
        let case = Case {
            id: CaseId::new(),
            title_en: title_en.to_string(),
            title_ar: None,
            target_amount,
            current_amount: Decimal::ZERO,
            status,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.insert_case(case.clone()).await;
        case
    }

    /// Replaces the stored rule configuration with raw JSON, bypassing
    /// validation.
    pub async fn set_rules_config(&self, raw: serde_json::Value) {
        self.state.write().await.rules = raw;
    }

    /// Makes every subsequent notification insert fail with a persistence
    /// error until reset.
    pub fn set_fail_notification_inserts(&self, fail: bool) {
        self.fail_notification_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of times the rule set has been read from the store.
    #[must_use]
    pub fn rule_loads(&self) -> usize {
        self.rule_loads.load(Ordering::SeqCst)
    }

    /// Total number of stored notifications across all recipients.
    pub async fn notification_count(&self) -> usize {
        self.state.read().await.notifications.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<ContributionRecord>, AppError> {
        Ok(self.state.read().await.contributions.get(&id).cloned())
    }

    async fn insert_contribution(
        &self,
        new: NewContribution,
    ) -> Result<ContributionRecord, AppError> {
        let now = Utc::now();
        let id = ContributionId::new();
        let record = ContributionRecord {
            contribution: Contribution {
                id,
                case_id: new.case_id,
                donor_id: new.donor_id,
                amount: new.amount,
                payment_method: new.payment_method,
                proof_url: new.proof_url.clone(),
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
                payment_proof_url: new.proof_url,
                resubmission_count: 0,
                created_at: now,
                updated_at: now,
            },
        };
        self.state
            .write()
            .await
            .contributions
            .insert(id, record.clone());
        Ok(record)
    }

    async fn transition_approval(
        &self,
        id: ContributionId,
        update: &ApprovalUpdate,
    ) -> Result<Option<ContributionRecord>, AppError> {
        let mut state = self.state.write().await;
        let Some(record) = state.contributions.get_mut(&id) else {
            return Ok(None);
        };
        if !update.action.is_allowed_from(record.state()) {
            return Ok(None);
        }
        update.apply(record);
        Ok(Some(record.clone()))
    }

    async fn get_case(&self, id: CaseId) -> Result<Option<Case>, AppError> {
        Ok(self.state.read().await.cases.get(&id).cloned())
    }

    async fn update_case_status(
        &self,
        id: CaseId,
        status: CaseStatus,
    ) -> Result<Option<(CaseStatus, Case)>, AppError> {
        let mut state = self.state.write().await;
        let Some(case) = state.cases.get_mut(&id) else {
            return Ok(None);
        };
        let previous = case.status;
        case.status = status;
        case.updated_at = Utc::now();
        Ok(Some((previous, case.clone())))
    }

    async fn approved_total(&self, case_id: CaseId) -> Result<Decimal, AppError> {
        Ok(self.state.read().await.approved_total(case_id))
    }

    async fn recalculate_case_amount(
        &self,
        case_id: CaseId,
    ) -> Result<Option<Recalculation>, AppError> {
        let mut state = self.state.write().await;
        let total = state.approved_total(case_id);
        let Some(case) = state.cases.get_mut(&case_id) else {
            return Ok(None);
        };
        let previous = case.current_amount;
        case.current_amount = total;
        case.updated_at = Utc::now();
        Ok(Some(Recalculation {
            case_id,
            previous,
            current: total,
            target: case.target_amount,
        }))
    }

    async fn find_contribution_notification(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        contribution_id: ContributionId,
    ) -> Result<Option<Notification>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .find(|n| {
                n.recipient_id == recipient
                    && n.kind == kind
                    && n.contribution_id() == Some(contribution_id)
            })
            .cloned())
    }

    async fn insert_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Option<Notification>, AppError> {
        if self.fail_notification_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Persistence(
                "notification insert failed".to_string(),
            ));
        }
        let mut state = self.state.write().await;
        if new.kind.is_deduplicated()
            && let Some(contribution_id) = new.contribution_id()
            && state.notifications.iter().any(|n| {
                n.recipient_id == new.recipient_id
                    && n.kind == new.kind
                    && n.contribution_id() == Some(contribution_id)
            })
        {
            return Ok(None);
        }
        let notification = Notification {
            id: NotificationId::new(),
            recipient_id: new.recipient_id,
            kind: new.kind,
            title: new.title.clone(),
            message: new.message.clone(),
            data: new.data.clone(),
            read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok(Some(notification))
    }

    async fn list_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let state = self.state.read().await;
        let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .inbox(recipient, unread_only)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn count_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<i64, AppError> {
        let state = self.state.read().await;
        let count = state.inbox(recipient, unread_only).count();
        i64::try_from(count).map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn mark_notification_read(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, recipient: UserId) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let mut changed = 0u64;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == recipient && !n.read)
        {
            n.read = true;
            changed = changed.saturating_add(1);
        }
        Ok(changed)
    }

    async fn delete_notification(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state
            .notifications
            .retain(|n| !(n.id == id && n.recipient_id == recipient));
        Ok(state.notifications.len() < before)
    }

    async fn load_notification_rules(&self) -> Result<Vec<NotificationRule>, AppError> {
        self.rule_loads.fetch_add(1, Ordering::SeqCst);
        let raw = self.state.read().await.rules.clone();
        Ok(NotificationRule::parse_set(raw))
    }

    async fn save_notification_rules(&self, rules: &[NotificationRule]) -> Result<(), AppError> {
        let raw = serde_json::to_value(rules).map_err(|e| AppError::Internal(e.to_string()))?;
        self.state.write().await.rules = raw;
        Ok(())
    }

    async fn user_ids_with_roles(&self, roles: &[String]) -> Result<Vec<UserId>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .profiles
            .iter()
            .filter(|(_, role)| roles.iter().any(|r| r == role.as_str()))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn all_user_ids(&self) -> Result<Vec<UserId>, AppError> {
        Ok(self.state.read().await.profiles.keys().copied().collect())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn store_with_case() -> (MemoryStore, Case) {
        let store = MemoryStore::new();
        let case = store
            .create_case("Clean water", dec!(1000), CaseStatus::Published, None)
            .await;
        (store, case)
    }

    fn new_contribution(case_id: CaseId, amount: Decimal) -> NewContribution {
        NewContribution {
            case_id,
            donor_id: Some(UserId::new()),
            amount,
            payment_method: "cash".to_string(),
            proof_url: None,
        }
    }

    fn pending_notice(recipient: UserId, contribution_id: ContributionId) -> NewNotification {
        NewNotification {
            recipient_id: recipient,
            kind: NotificationKind::ContributionPending,
            title: "Pending".to_string(),
            message: "Under review".to_string(),
            data: serde_json::json!({ "contribution_id": contribution_id.to_string() }),
        }
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let (store, case) = store_with_case().await;
        let Ok(record) = store
            .insert_contribution(new_contribution(case.id, dec!(100)))
            .await
        else {
            panic!("insert failed");
        };
        let id = record.contribution.id;
        let admin = UserId::new();

        let Ok(first) = store
            .transition_approval(id, &ApprovalUpdate::approve(admin))
            .await
        else {
            panic!("first approve failed");
        };
        assert_eq!(first.map(|r| r.state()), Some(ApprovalState::Approved));

        let Ok(second) = store
            .transition_approval(id, &ApprovalUpdate::approve(admin))
            .await
        else {
            panic!("second approve failed");
        };
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn unknown_contribution_transition_is_none() {
        let store = MemoryStore::new();
        let Ok(result) = store
            .transition_approval(ContributionId::new(), &ApprovalUpdate::acknowledge())
            .await
        else {
            panic!("transition errored");
        };
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn recalculate_sums_only_credited() {
        let (store, case) = store_with_case().await;
        let mut ids = Vec::new();
        for amount in [dec!(100), dec!(50), dec!(25)] {
            let Ok(r) = store.insert_contribution(new_contribution(case.id, amount)).await else {
                panic!("insert failed");
            };
            ids.push(r.contribution.id);
        }
        let admin = UserId::new();
        for (id, update) in ids.iter().zip([
            ApprovalUpdate::approve(admin),
            ApprovalUpdate::reject(admin, "insufficient_proof".to_string(), None),
            ApprovalUpdate::approve(admin),
        ]) {
            let Ok(Some(_)) = store.transition_approval(*id, &update).await else {
                panic!("transition failed");
            };
        }

        let Ok(Some(recalc)) = store.recalculate_case_amount(case.id).await else {
            panic!("recalculate failed");
        };
        assert_eq!(recalc.previous, dec!(0));
        assert_eq!(recalc.current, dec!(125));
        assert_eq!(recalc.target, dec!(1000));
    }

    #[tokio::test]
    async fn acknowledged_approvals_stay_in_the_total() {
        let (store, case) = store_with_case().await;
        let admin = UserId::new();
        let mut ids = Vec::new();
        for amount in [dec!(100), dec!(40)] {
            let Ok(r) = store.insert_contribution(new_contribution(case.id, amount)).await else {
                panic!("insert failed");
            };
            ids.push(r.contribution.id);
        }
        let (Some(approved), Some(rejected)) = (ids.first().copied(), ids.get(1).copied()) else {
            panic!("two contributions expected");
        };
        for (id, update) in [
            (approved, ApprovalUpdate::approve(admin)),
            (approved, ApprovalUpdate::acknowledge()),
            (rejected, ApprovalUpdate::reject(admin, "duplicate".to_string(), None)),
            (rejected, ApprovalUpdate::acknowledge()),
        ] {
            let Ok(Some(_)) = store.transition_approval(id, &update).await else {
                panic!("transition failed");
            };
        }

        assert!(matches!(store.approved_total(case.id).await, Ok(t) if t == dec!(100)));
        let Ok(Some(recalc)) = store.recalculate_case_amount(case.id).await else {
            panic!("recalculate failed");
        };
        assert_eq!(recalc.current, dec!(100));
    }

    #[tokio::test]
    async fn pending_notice_is_deduplicated_inside_insert() {
        let store = MemoryStore::new();
        let recipient = UserId::new();
        let contribution = ContributionId::new();

        let Ok(first) = store
            .insert_notification(&pending_notice(recipient, contribution))
            .await
        else {
            panic!("insert failed");
        };
        assert!(first.is_some());

        let Ok(second) = store
            .insert_notification(&pending_notice(recipient, contribution))
            .await
        else {
            panic!("insert failed");
        };
        assert!(second.is_none());

        let Ok(other_recipient) = store
            .insert_notification(&pending_notice(UserId::new(), contribution))
            .await
        else {
            panic!("insert failed");
        };
        assert!(other_recipient.is_some());
    }

    #[tokio::test]
    async fn inbox_is_newest_first_and_scoped() {
        let store = MemoryStore::new();
        let me = UserId::new();
        for i in 0..3 {
            let n = NewNotification {
                recipient_id: me,
                kind: NotificationKind::CaseUpdate,
                title: format!("n{i}"),
                message: String::new(),
                data: serde_json::json!({}),
            };
            let Ok(Some(_)) = store.insert_notification(&n).await else {
                panic!("insert failed");
            };
        }
        let Ok(Some(foreign)) = store
            .insert_notification(&pending_notice(UserId::new(), ContributionId::new()))
            .await
        else {
            panic!("insert failed");
        };

        let Ok(page) = store.list_notifications(me, false, 2, 0).await else {
            panic!("list failed");
        };
        let titles: Vec<_> = page.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["n2", "n1"]);

        let Ok(deleted) = store.delete_notification(me, foreign.id).await else {
            panic!("delete failed");
        };
        assert!(!deleted);

        let Ok(changed) = store.mark_all_notifications_read(me).await else {
            panic!("mark all failed");
        };
        assert_eq!(changed, 3);
        assert!(matches!(store.count_notifications(me, true).await, Ok(0)));
    }

    #[tokio::test]
    async fn failing_inserts_surface_persistence_errors() {
        let store = MemoryStore::new();
        store.set_fail_notification_inserts(true);
        let result = store
            .insert_notification(&pending_notice(UserId::new(), ContributionId::new()))
            .await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn role_lookup_uses_stored_names() {
        let store = MemoryStore::new();
        let admin = UserId::new();
        let donor = UserId::new();
        store.insert_profile(admin, Role::SuperAdmin).await;
        store.insert_profile(donor, Role::Donor).await;

        let Ok(ids) = store
            .user_ids_with_roles(&["admin".to_string(), "super_admin".to_string()])
            .await
        else {
            panic!("lookup failed");
        };
        assert_eq!(ids, vec![admin]);
        assert!(matches!(store.all_user_ids().await, Ok(all) if all.len() == 2));
    }
}
