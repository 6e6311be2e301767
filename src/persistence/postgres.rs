//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{ApprovalRow, CaseRow, ContributionRow, NotificationRow};
use super::{Store, normalize_join};
use crate::config::AppConfig;
use crate::domain::{
    ApprovalAction, ApprovalStatus, ApprovalUpdate, Case, CaseId, CaseStatus,
    Contribution, ContributionId, ContributionRecord, NewContribution, NewNotification,
    Notification, NotificationId, NotificationKind, NotificationRule, Recalculation, UserId,
};
use crate::error::AppError;

const CONTRIBUTION_COLUMNS: &str =
    "id, case_id, donor_id, amount, payment_method, proof_url, status, created_at";

const APPROVAL_COLUMNS: &str = "id, contribution_id, status, admin_id, approved_at, rejection_reason, \
     admin_comment, donor_reply, donor_reply_date, payment_proof_url, resubmission_count, \
     created_at, updated_at";

const CASE_COLUMNS: &str = "id, title_en, title_ar, target_amount, current_amount, status, \
     created_by, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, type, title, message, data, read, created_at";

// Sum of every credited (approved, possibly since acknowledged) contribution.
const CREDITED_TOTAL_SQL: &str = "SELECT COALESCE(SUM(c.amount), 0) FROM contributions c \
     JOIN contribution_approval_status s ON s.contribution_id = c.id \
     WHERE c.case_id = $1 AND s.approved_at IS NOT NULL";

const RULES_CONFIG_KEY: &str = "notification_rules";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations in `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn approval_for(&self, id: Uuid) -> Result<Option<ApprovalStatus>, AppError> {
        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM contribution_approval_status WHERE contribution_id = $1"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        normalize_join(rows, "contribution_approval_status")?
            .map(ApprovalStatus::try_from)
            .transpose()
    }
}

fn allowed_states(action: ApprovalAction) -> Vec<String> {
    action
        .allowed_from()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<ContributionRecord>, AppError> {
        let row = sqlx::query_as::<_, ContributionRow>(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contributions WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let contribution = Contribution::try_from(row)?;
        let approval = self.approval_for(*id.as_uuid()).await?.ok_or_else(|| {
            AppError::Persistence(format!("contribution {id} has no approval row"))
        })?;

        Ok(Some(ContributionRecord {
            contribution,
            approval,
        }))
    }

    async fn insert_contribution(
        &self,
        new: NewContribution,
    ) -> Result<ContributionRecord, AppError> {
        let contribution_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let contribution = sqlx::query_as::<_, ContributionRow>(&format!(
            "INSERT INTO contributions (id, case_id, donor_id, amount, payment_method, proof_url, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending') RETURNING {CONTRIBUTION_COLUMNS}"
        ))
        .bind(contribution_id)
        .bind(*new.case_id.as_uuid())
        .bind(new.donor_id.map(Uuid::from))
        .bind(new.amount)
        .bind(&new.payment_method)
        .bind(&new.proof_url)
        .fetch_one(&mut *tx)
        .await?;

        let approval = sqlx::query_as::<_, ApprovalRow>(&format!(
            "INSERT INTO contribution_approval_status (id, contribution_id, status, payment_proof_url) \
             VALUES ($1, $2, 'pending', $3) RETURNING {APPROVAL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(contribution_id)
        .bind(&new.proof_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ContributionRecord {
            contribution: contribution.try_into()?,
            approval: approval.try_into()?,
        })
    }

    async fn transition_approval(
        &self,
        id: ContributionId,
        update: &ApprovalUpdate,
    ) -> Result<Option<ContributionRecord>, AppError> {
        let allowed = allowed_states(update.action);
        let target = update.action.target().as_str();
        let mut tx = self.pool.begin().await?;

        let approval = match update.action {
            ApprovalAction::Approve => {
                sqlx::query_as::<_, ApprovalRow>(&format!(
                    "UPDATE contribution_approval_status \
                     SET status = $3, admin_id = $4, approved_at = $5, updated_at = $5 \
                     WHERE contribution_id = $1 AND status = ANY($2) \
                     RETURNING {APPROVAL_COLUMNS}"
                ))
                .bind(*id.as_uuid())
                .bind(&allowed)
                .bind(target)
                .bind(update.admin_id.map(Uuid::from))
                .bind(update.at)
                .fetch_optional(&mut *tx)
                .await?
            }
            ApprovalAction::Reject => {
                sqlx::query_as::<_, ApprovalRow>(&format!(
                    "UPDATE contribution_approval_status \
                     SET status = $3, admin_id = $4, rejection_reason = $5, admin_comment = $6, \
                         updated_at = $7 \
                     WHERE contribution_id = $1 AND status = ANY($2) \
                     RETURNING {APPROVAL_COLUMNS}"
                ))
                .bind(*id.as_uuid())
                .bind(&allowed)
                .bind(target)
                .bind(update.admin_id.map(Uuid::from))
                .bind(&update.rejection_reason)
                .bind(&update.admin_comment)
                .bind(update.at)
                .fetch_optional(&mut *tx)
                .await?
            }
            ApprovalAction::Resubmit => {
                sqlx::query_as::<_, ApprovalRow>(&format!(
                    "UPDATE contribution_approval_status \
                     SET status = $3, payment_proof_url = $4, donor_reply = $5, \
                         donor_reply_date = $6, resubmission_count = resubmission_count + 1, \
                         updated_at = $6 \
                     WHERE contribution_id = $1 AND status = ANY($2) \
                     RETURNING {APPROVAL_COLUMNS}"
                ))
                .bind(*id.as_uuid())
                .bind(&allowed)
                .bind(target)
                .bind(&update.payment_proof_url)
                .bind(&update.donor_reply)
                .bind(update.at)
                .fetch_optional(&mut *tx)
                .await?
            }
            ApprovalAction::Acknowledge => {
                sqlx::query_as::<_, ApprovalRow>(&format!(
                    "UPDATE contribution_approval_status \
                     SET status = $3, updated_at = $4 \
                     WHERE contribution_id = $1 AND status = ANY($2) \
                     RETURNING {APPROVAL_COLUMNS}"
                ))
                .bind(*id.as_uuid())
                .bind(&allowed)
                .bind(target)
                .bind(update.at)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let Some(approval) = approval else {
            // Nothing matched: dropping the transaction rolls it back.
            return Ok(None);
        };

        let new_proof = match update.action {
            ApprovalAction::Resubmit => update.payment_proof_url.clone(),
            _ => None,
        };
        let contribution = sqlx::query_as::<_, ContributionRow>(&format!(
            "UPDATE contributions SET status = $2, proof_url = COALESCE($3, proof_url) \
             WHERE id = $1 RETURNING {CONTRIBUTION_COLUMNS}"
        ))
        .bind(*id.as_uuid())
        .bind(target)
        .bind(new_proof)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(ContributionRecord {
            contribution: contribution.try_into()?,
            approval: approval.try_into()?,
        }))
    }

    async fn get_case(&self, id: CaseId) -> Result<Option<Case>, AppError> {
        sqlx::query_as::<_, CaseRow>(&format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Case::try_from)
            .transpose()
    }

    async fn update_case_status(
        &self,
        id: CaseId,
        status: CaseStatus,
    ) -> Result<Option<(CaseStatus, Case)>, AppError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, String>(
            "SELECT status FROM cases WHERE id = $1 FOR UPDATE",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(previous) = previous else {
            return Ok(None);
        };
        let previous = CaseStatus::parse(&previous).ok_or_else(|| {
            AppError::Persistence(format!("unrecognized cases.status value {previous:?}"))
        })?;

        let row = sqlx::query_as::<_, CaseRow>(&format!(
            "UPDATE cases SET status = $2, updated_at = now() WHERE id = $1 RETURNING {CASE_COLUMNS}"
        ))
        .bind(*id.as_uuid())
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((previous, row.try_into()?)))
    }

    async fn approved_total(&self, case_id: CaseId) -> Result<Decimal, AppError> {
        let total = sqlx::query_scalar::<_, Decimal>(CREDITED_TOTAL_SQL)
            .bind(*case_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn recalculate_case_amount(
        &self,
        case_id: CaseId,
    ) -> Result<Option<Recalculation>, AppError> {
        let mut tx = self.pool.begin().await?;

        // The lock is taken in its own statement so the sum below reads a
        // snapshot that includes every approval committed while waiting.
        let locked = sqlx::query_as::<_, (Decimal, Decimal)>(
            "SELECT current_amount, target_amount FROM cases WHERE id = $1 FOR UPDATE",
        )
        .bind(*case_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((previous, target)) = locked else {
            return Ok(None);
        };

        let total = sqlx::query_scalar::<_, Decimal>(CREDITED_TOTAL_SQL)
            .bind(*case_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

        let current = sqlx::query_scalar::<_, Decimal>(
            "UPDATE cases SET current_amount = $2, updated_at = now() WHERE id = $1 \
             RETURNING current_amount",
        )
        .bind(*case_id.as_uuid())
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(Recalculation {
            case_id,
            previous,
            current,
            target,
        }))
    }

    async fn find_contribution_notification(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        contribution_id: ContributionId,
    ) -> Result<Option<Notification>, AppError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 AND type = $2 AND data ->> 'contribution_id' = $3 \
             ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(*recipient.as_uuid())
        .bind(kind.as_str())
        .bind(contribution_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        normalize_join(rows, "notifications")?
            .map(Notification::try_from)
            .transpose()
    }

    async fn insert_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Option<Notification>, AppError> {
        sqlx::query_as::<_, NotificationRow>(&format!(
            "INSERT INTO notifications (id, recipient_id, type, title, message, data) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT DO NOTHING RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(*new.recipient_id.as_uuid())
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&new.message)
        .bind(&new.data)
        .fetch_optional(&self.pool)
        .await?
        .map(Notification::try_from)
        .transpose()
    }

    async fn list_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 AND (NOT $2 OR read = false) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(*recipient.as_uuid())
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn count_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND (NOT $2 OR read = false)",
        )
        .bind(*recipient.as_uuid())
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_notification_read(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE notifications SET read = true WHERE id = $1 AND recipient_id = $2")
                .bind(*id.as_uuid())
                .bind(*recipient.as_uuid())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&self, recipient: UserId) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read = true WHERE recipient_id = $1 AND read = false",
        )
        .bind(*recipient.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(*id.as_uuid())
            .bind(*recipient.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_notification_rules(&self) -> Result<Vec<NotificationRule>, AppError> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT value FROM system_config WHERE key = $1",
        )
        .bind(RULES_CONFIG_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.map(NotificationRule::parse_set).unwrap_or_default())
    }

    async fn save_notification_rules(&self, rules: &[NotificationRule]) -> Result<(), AppError> {
        let value = serde_json::to_value(rules).map_err(|e| AppError::Internal(e.to_string()))?;
        sqlx::query(
            "INSERT INTO system_config (key, value, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(RULES_CONFIG_KEY)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_ids_with_roles(&self, roles: &[String]) -> Result<Vec<UserId>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM profiles WHERE role = ANY($1)")
            .bind(roles)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn all_user_ids(&self) -> Result<Vec<UserId>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM profiles")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }
}
