//! Notification inbox and case DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{Case, CaseStatus, Notification};

/// Response body for `GET /notifications`.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListResponse {
    /// Notifications on this page, newest first.
    pub data: Vec<Notification>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `GET /notifications/unread-count`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    /// Unread notifications of the caller.
    pub unread: i64,
}

/// Response body for `POST /notifications/read-all`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Notifications that changed from unread to read.
    pub updated: u64,
}

/// Request body for `PATCH /cases/{id}/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CaseStatusRequest {
    /// New status.
    pub status: CaseStatus,
}

/// Response body for `PATCH /cases/{id}/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CaseStatusResponse {
    /// The case after the change.
    pub case: Case,
    /// Number of rule-driven notifications created.
    pub notifications_created: usize,
}
