//! Database row types and their conversion into domain records.
//!
//! Status columns are plain `TEXT` with `CHECK` constraints; a value the
//! domain does not recognize is reported as a persistence error rather than
//! silently mapped.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    ApprovalState, ApprovalStatus, Case, CaseStatus, Contribution, Notification,
    NotificationKind,
};
use crate::error::AppError;

/// A row of the `contributions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContributionRow {
    /// Row ID.
    pub id: Uuid,
    /// Target case.
    pub case_id: Uuid,
    /// Donor (nullable for anonymous).
    pub donor_id: Option<Uuid>,
    /// Contributed amount.
    pub amount: Decimal,
    /// Payment method label.
    pub payment_method: String,
    /// Latest proof URL.
    pub proof_url: Option<String>,
    /// Legacy status mirror.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A row of the `contribution_approval_status` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApprovalRow {
    /// Row ID.
    pub id: Uuid,
    /// Owning contribution.
    pub contribution_id: Uuid,
    /// Review status.
    pub status: String,
    /// Deciding admin.
    pub admin_id: Option<Uuid>,
    /// Approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Rejection reason.
    pub rejection_reason: Option<String>,
    /// Admin remark.
    pub admin_comment: Option<String>,
    /// Donor reply.
    pub donor_reply: Option<String>,
    /// Donor reply timestamp.
    pub donor_reply_date: Option<DateTime<Utc>>,
    /// Resubmitted proof URL.
    pub payment_proof_url: Option<String>,
    /// Resubmission counter.
    pub resubmission_count: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A row of the `cases` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CaseRow {
    /// Row ID.
    pub id: Uuid,
    /// English title.
    pub title_en: String,
    /// Arabic title.
    pub title_ar: Option<String>,
    /// Fundraising goal.
    pub target_amount: Decimal,
    /// Derived total of approved contributions.
    pub current_amount: Decimal,
    /// Publication status.
    pub status: String,
    /// Creator.
    pub created_by: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A row of the `notifications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    /// Row ID.
    pub id: Uuid,
    /// Recipient.
    pub recipient_id: Uuid,
    /// Type discriminator.
    #[sqlx(rename = "type")]
    pub kind: String,
    /// Title.
    pub title: String,
    /// Message.
    pub message: String,
    /// JSONB payload.
    pub data: serde_json::Value,
    /// Read flag.
    pub read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

fn unknown(column: &str, value: &str) -> AppError {
    AppError::Persistence(format!("unrecognized {column} value {value:?}"))
}

impl TryFrom<ContributionRow> for Contribution {
    type Error = AppError;

    fn try_from(row: ContributionRow) -> Result<Self, Self::Error> {
        let status = ApprovalState::parse(&row.status)
            .ok_or_else(|| unknown("contributions.status", &row.status))?;
        Ok(Self {
            id: row.id.into(),
            case_id: row.case_id.into(),
            donor_id: row.donor_id.map(Into::into),
            amount: row.amount,
            payment_method: row.payment_method,
            proof_url: row.proof_url,
            status,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ApprovalRow> for ApprovalStatus {
    type Error = AppError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        let status = ApprovalState::parse(&row.status)
            .ok_or_else(|| unknown("contribution_approval_status.status", &row.status))?;
        Ok(Self {
            id: row.id,
            contribution_id: row.contribution_id.into(),
            status,
            admin_id: row.admin_id.map(Into::into),
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            admin_comment: row.admin_comment,
            donor_reply: row.donor_reply,
            donor_reply_date: row.donor_reply_date,
            payment_proof_url: row.payment_proof_url,
            resubmission_count: row.resubmission_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<CaseRow> for Case {
    type Error = AppError;

    fn try_from(row: CaseRow) -> Result<Self, Self::Error> {
        let status =
            CaseStatus::parse(&row.status).ok_or_else(|| unknown("cases.status", &row.status))?;
        Ok(Self {
            id: row.id.into(),
            title_en: row.title_en,
            title_ar: row.title_ar,
            target_amount: row.target_amount,
            current_amount: row.current_amount,
            status,
            created_by: row.created_by.map(Into::into),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = NotificationKind::parse(&row.kind)
            .ok_or_else(|| unknown("notifications.type", &row.kind))?;
        Ok(Self {
            id: row.id.into(),
            recipient_id: row.recipient_id.into(),
            kind,
            title: row.title,
            message: row.message,
            data: row.data,
            read: row.read,
            created_at: row.created_at,
        })
    }
}
