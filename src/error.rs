//! Service error type with HTTP status code mapping.
//!
//! [`AppError`] is the central error type. Each variant maps to a specific
//! HTTP status code and a structured JSON error response. Server-side
//! failures are logged with a correlation id and answered with a generic
//! message that carries only that id.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ApprovalAction, ApprovalState, CaseId, ContributionId, NotificationId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "cannot approve contribution ...: status is approved",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`AppError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details (the correlation id for 5xx).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation/Auth | 400 / 401 / 403              |
/// | 2000–2099 | Not Found       | 404 Not Found                |
/// | 2100–2199 | State           | 409 Conflict                 |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed input, rejected before any write.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No usable identity on the request.
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated, but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Contribution with the given ID was not found.
    #[error("contribution not found: {0}")]
    ContributionNotFound(ContributionId),

    /// Case with the given ID was not found.
    #[error("case not found: {0}")]
    CaseNotFound(CaseId),

    /// Notification with the given ID was not found for the caller.
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// Notification rule with the given ID was not found.
    #[error("notification rule not found: {0}")]
    RuleNotFound(String),

    /// The contribution's current status does not allow the action.
    #[error("cannot {action} contribution {contribution_id}: status is {current}")]
    InvalidState {
        /// Contribution the action targeted.
        contribution_id: ContributionId,
        /// Attempted action.
        action: ApprovalAction,
        /// Status observed when the conditional write matched nothing.
        current: ApprovalState,
    },

    /// Database read/write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::Unauthorized => 1002,
            Self::Forbidden(_) => 1003,
            Self::ContributionNotFound(_) => 2001,
            Self::CaseNotFound(_) => 2002,
            Self::NotificationNotFound(_) => 2003,
            Self::RuleNotFound(_) => 2004,
            Self::InvalidState { .. } => 2101,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ContributionNotFound(_)
            | Self::CaseNotFound(_)
            | Self::NotificationNotFound(_)
            | Self::RuleNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for failures of the service itself (5xx).
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Internal(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, details) = if self.is_server_error() {
            let correlation_id = uuid::Uuid::new_v4().to_string();
            tracing::error!(%correlation_id, code = self.error_code(), error = %self, "request failed");
            (
                "internal server error".to_string(),
                Some(format!("correlation_id={correlation_id}")),
            )
        } else {
            (self.to_string(), None)
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_is_conflict() {
        let err = AppError::InvalidState {
            contribution_id: ContributionId::new(),
            action: ApprovalAction::Approve,
            current: ApprovalState::Approved,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), 2101);
        assert!(err.to_string().contains("cannot approve"));
        assert!(err.to_string().contains("status is approved"));
        assert!(!err.is_server_error());
    }

    #[test]
    fn persistence_is_server_error() {
        let err = AppError::Persistence("connection reset".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }

    #[test]
    fn server_error_response_hides_details() {
        let response = AppError::Persistence("password=hunter2".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_and_auth_codes() {
        assert_eq!(AppError::Validation("x".to_string()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".to_string()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::RuleNotFound("r".to_string()).error_code(), 2004);
    }
}
