//! User-facing notification records.
//!
//! Notifications are created by server-side emitters only. After creation
//! the payload is immutable; the recipient may mark it read or delete it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{ContributionId, NotificationId, UserId};

/// Notification type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A contribution was submitted or resubmitted and awaits review.
    ContributionPending,
    /// A contribution was approved.
    ContributionApproved,
    /// A contribution was rejected.
    ContributionRejected,
    /// A case changed (rule-driven).
    CaseUpdate,
    /// A case the recipient contributed to made progress.
    CaseProgress,
    /// A case received a new contribution.
    CaseContribution,
    /// A case crossed a funding milestone.
    CaseMilestone,
}

impl NotificationKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::ContributionPending,
        Self::ContributionApproved,
        Self::ContributionRejected,
        Self::CaseUpdate,
        Self::CaseProgress,
        Self::CaseContribution,
        Self::CaseMilestone,
    ];

    /// Returns the string representation stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContributionPending => "contribution_pending",
            Self::ContributionApproved => "contribution_approved",
            Self::ContributionRejected => "contribution_rejected",
            Self::CaseUpdate => "case_update",
            Self::CaseProgress => "case_progress",
            Self::CaseContribution => "case_contribution",
            Self::CaseMilestone => "case_milestone",
        }
    }

    /// Parses a kind from its database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contribution_pending" => Some(Self::ContributionPending),
            "contribution_approved" => Some(Self::ContributionApproved),
            "contribution_rejected" => Some(Self::ContributionRejected),
            "case_update" => Some(Self::CaseUpdate),
            "case_progress" => Some(Self::CaseProgress),
            "case_contribution" => Some(Self::CaseContribution),
            "case_milestone" => Some(Self::CaseMilestone),
            _ => None,
        }
    }

    /// Whether inserts of this kind are deduplicated per
    /// (contribution, recipient).
    #[must_use]
    pub const fn is_deduplicated(&self) -> bool {
        matches!(self, Self::ContributionPending)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Notification {
    /// Notification identifier.
    pub id: NotificationId,
    /// Receiving user.
    pub recipient_id: UserId,
    /// Type discriminator.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Structured payload (e.g. `contribution_id`, `case_id`).
    pub data: serde_json::Value,
    /// Whether the recipient has read it.
    pub read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Contribution referenced by the payload, if any.
    #[must_use]
    pub fn contribution_id(&self) -> Option<ContributionId> {
        contribution_id_of(&self.data)
    }
}

/// A notification about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    /// Receiving user.
    pub recipient_id: UserId,
    /// Type discriminator.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Structured payload.
    pub data: serde_json::Value,
}

impl NewNotification {
    /// Contribution referenced by the payload, if any.
    #[must_use]
    pub fn contribution_id(&self) -> Option<ContributionId> {
        contribution_id_of(&self.data)
    }
}

fn contribution_id_of(data: &serde_json::Value) -> Option<ContributionId> {
    data.get("contribution_id")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse::<uuid::Uuid>().ok())
        .map(ContributionId::from_uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_deduplicated() {
        assert!(NotificationKind::ContributionPending.is_deduplicated());
        assert!(!NotificationKind::ContributionApproved.is_deduplicated());
        assert!(!NotificationKind::CaseMilestone.is_deduplicated());
    }

    #[test]
    fn kind_parse_round_trip() {
        for kind in NotificationKind::ALL {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn contribution_id_is_read_from_payload() {
        let id = ContributionId::new();
        let n = NewNotification {
            recipient_id: UserId::new(),
            kind: NotificationKind::ContributionPending,
            title: "t".to_string(),
            message: "m".to_string(),
            data: serde_json::json!({ "contribution_id": id.to_string() }),
        };
        assert_eq!(n.contribution_id(), Some(id));
    }

    #[test]
    fn missing_contribution_id_is_none() {
        let n = NewNotification {
            recipient_id: UserId::new(),
            kind: NotificationKind::CaseUpdate,
            title: "t".to_string(),
            message: "m".to_string(),
            data: serde_json::json!({ "case_id": "not-a-uuid" }),
        };
        assert_eq!(n.contribution_id(), None);
    }
}
