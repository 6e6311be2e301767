//! Notification inbox handlers, scoped to the caller.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::dto::{
    InboxParams, MarkAllReadResponse, NotificationListResponse, PaginationMeta, UnreadCountResponse,
};
use crate::app_state::AppState;
use crate::domain::NotificationId;
use crate::error::{AppError, ErrorResponse};

/// `GET /notifications` — The caller's notifications, newest first.
///
/// # Errors
///
/// Returns [`AppError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    summary = "List notifications",
    params(InboxParams),
    responses(
        (status = 200, description = "Paginated inbox", body = NotificationListResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<InboxParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .notifications
        .list(user.id, params.unread_only, params.page, params.per_page)
        .await?;
    Ok(Json(NotificationListResponse {
        pagination: PaginationMeta::new(page.page, page.per_page, page.total),
        data: page.items,
    }))
}

/// `GET /notifications/unread-count` — Number of unread notifications.
///
/// # Errors
///
/// Returns [`AppError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "Notifications",
    summary = "Unread count",
    responses(
        (status = 200, description = "Unread count", body = UnreadCountResponse),
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let unread = state.notifications.unread_count(user.id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// `POST /notifications/{id}/read` — Mark one notification read.
///
/// # Errors
///
/// Returns [`AppError::NotificationNotFound`] if the caller has no such
/// notification.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    tag = "Notifications",
    summary = "Mark read",
    params(("id" = Uuid, Path, description = "Notification UUID")),
    responses(
        (status = 204, description = "Marked read"),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .notifications
        .mark_read(user.id, NotificationId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /notifications/read-all` — Mark all of the caller's notifications
/// read.
///
/// # Errors
///
/// Returns [`AppError`] on store failure.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    summary = "Mark all read",
    responses(
        (status = 200, description = "Marked read", body = MarkAllReadResponse),
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.notifications.mark_all_read(user.id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// `DELETE /notifications/{id}` — Delete one notification.
///
/// # Errors
///
/// Returns [`AppError::NotificationNotFound`] if the caller has no such
/// notification.
#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    summary = "Delete notification",
    params(("id" = Uuid, Path, description = "Notification UUID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .notifications
        .delete(user.id, NotificationId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Notification routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}", delete(delete_notification))
        .route("/notifications/{id}/read", post(mark_read))
}
