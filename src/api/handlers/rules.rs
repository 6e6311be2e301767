//! Notification rule administration (admin only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::api::auth::AuthUser;
use crate::app_state::AppState;
use crate::domain::NotificationRule;
use crate::error::{AppError, ErrorResponse};

/// `GET /notification-rules` — Every configured rule.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/notification-rules",
    tag = "Notification rules",
    summary = "List rules",
    responses(
        (status = 200, description = "Rules", body = Vec<NotificationRule>),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    )
)]
pub async fn list_rules(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    Ok(Json(state.rules.list_rules().await?))
}

/// `POST /notification-rules` — Add a rule.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for a malformed rule or a taken id.
#[utoipa::path(
    post,
    path = "/api/v1/notification-rules",
    tag = "Notification rules",
    summary = "Create rule",
    request_body = NotificationRule,
    responses(
        (status = 201, description = "Rule created", body = NotificationRule),
        (status = 400, description = "Malformed rule", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    )
)]
pub async fn create_rule(
    State(state): State<AppState>,
    user: AuthUser,
    Json(rule): Json<NotificationRule>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let rule = state.rules.create_rule(rule).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// `PUT /notification-rules/{id}` — Replace a rule.
///
/// # Errors
///
/// Returns [`AppError::RuleNotFound`] if no rule has that id.
#[utoipa::path(
    put,
    path = "/api/v1/notification-rules/{id}",
    tag = "Notification rules",
    summary = "Replace rule",
    params(("id" = String, Path, description = "Rule id")),
    request_body = NotificationRule,
    responses(
        (status = 200, description = "Rule replaced", body = NotificationRule),
        (status = 404, description = "Rule not found", body = ErrorResponse),
    )
)]
pub async fn update_rule(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(rule): Json<NotificationRule>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    Ok(Json(state.rules.update_rule(&id, rule).await?))
}

/// `DELETE /notification-rules/{id}` — Remove a rule.
///
/// # Errors
///
/// Returns [`AppError::RuleNotFound`] if no rule has that id.
#[utoipa::path(
    delete,
    path = "/api/v1/notification-rules/{id}",
    tag = "Notification rules",
    summary = "Delete rule",
    params(("id" = String, Path, description = "Rule id")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found", body = ErrorResponse),
    )
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    state.rules.delete_rule(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rule routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notification-rules", get(list_rules).post(create_rule))
        .route("/notification-rules/{id}", put(update_rule).delete(delete_rule))
}
