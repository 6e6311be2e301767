//! Persistence layer: typed access to contributions, approval rows, cases,
//! notifications, profiles, and the rule configuration.
//!
//! [`Store`] is the seam the service layer talks to. [`postgres::PostgresStore`]
//! is the production backend (sqlx on PostgreSQL); [`memory::MemoryStore`]
//! keeps everything in process and backs the test-suite and
//! `STORE_BACKEND=memory` deployments.
//!
//! Approval transitions are conditional writes: a store only applies an
//! [`ApprovalUpdate`] when the current status is one of the action's
//! allowed source states, and reports `None` otherwise. This is what makes
//! concurrent approvals of the same contribution at-most-once.

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{
    ApprovalUpdate, Case, CaseId, CaseStatus, ContributionId, ContributionRecord, NewContribution,
    NewNotification, Notification, NotificationId, NotificationKind, NotificationRule,
    Recalculation, UserId,
};
use crate::error::AppError;

/// Typed read/write operations used by the services.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Loads a contribution joined with its approval row.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure or when the
    /// 1:1 approval row is missing or duplicated.
    async fn get_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<ContributionRecord>, AppError>;

    /// Creates a contribution and its `pending` approval row in one write.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn insert_contribution(
        &self,
        new: NewContribution,
    ) -> Result<ContributionRecord, AppError>;

    /// Applies `update` only if the current status allows its action.
    ///
    /// Returns the updated record, or `None` when no row matched (unknown
    /// contribution or disallowed current status). Also mirrors the new
    /// status into the legacy `contributions.status` column.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn transition_approval(
        &self,
        id: ContributionId,
        update: &ApprovalUpdate,
    ) -> Result<Option<ContributionRecord>, AppError>;

    /// Loads a case.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn get_case(&self, id: CaseId) -> Result<Option<Case>, AppError>;

    /// Sets a case's status, returning the previous status and the updated
    /// case, or `None` if the case does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn update_case_status(
        &self,
        id: CaseId,
        status: CaseStatus,
    ) -> Result<Option<(CaseStatus, Case)>, AppError>;

    /// Sums the amounts of the case's credited contributions: every one
    /// that was approved, including those acknowledged since.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn approved_total(&self, case_id: CaseId) -> Result<Decimal, AppError>;

    /// Recomputes `current_amount` from the credited contributions while
    /// holding the case row, so concurrent recomputes serialize and the
    /// last one sees every committed approval. `None` if the case does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn recalculate_case_amount(
        &self,
        case_id: CaseId,
    ) -> Result<Option<Recalculation>, AppError>;

    /// Finds a notification of `kind` for `recipient` whose payload names
    /// `contribution_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn find_contribution_notification(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        contribution_id: ContributionId,
    ) -> Result<Option<Notification>, AppError>;

    /// Inserts a notification. Returns `None` when a deduplicated kind
    /// already has a row for the same (contribution, recipient).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn insert_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Option<Notification>, AppError>;

    /// Lists a recipient's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn list_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError>;

    /// Counts a recipient's notifications.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn count_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<i64, AppError>;

    /// Marks one of the recipient's notifications read. `false` if it does
    /// not exist or belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn mark_notification_read(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, AppError>;

    /// Marks all of the recipient's notifications read, returning how many
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn mark_all_notifications_read(&self, recipient: UserId) -> Result<u64, AppError>;

    /// Deletes one of the recipient's notifications.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn delete_notification(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, AppError>;

    /// Loads the configured notification rules (enabled and disabled).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure or malformed
    /// stored JSON.
    async fn load_notification_rules(&self) -> Result<Vec<NotificationRule>, AppError>;

    /// Replaces the stored rule set.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn save_notification_rules(&self, rules: &[NotificationRule]) -> Result<(), AppError>;

    /// Users holding any of the given roles.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn user_ids_with_roles(&self, roles: &[String]) -> Result<Vec<UserId>, AppError>;

    /// Every registered user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    async fn all_user_ids(&self) -> Result<Vec<UserId>, AppError>;
}

/// Resolves the rows of a 1:1 join to a single value.
///
/// Zero rows yield `None`, one row yields `Some`, and more than one row is a
/// broken invariant reported as [`AppError::Persistence`].
///
/// # Errors
///
/// Returns [`AppError::Persistence`] when `rows` holds more than one item.
pub fn normalize_join<T>(rows: Vec<T>, relation: &str) -> Result<Option<T>, AppError> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (None, _) => Ok(None),
        (Some(one), None) => Ok(Some(one)),
        (Some(_), Some(_)) => Err(AppError::Persistence(format!(
            "expected at most one {relation} row, found several"
        ))),
    }
}
