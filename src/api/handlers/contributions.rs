//! Contribution handlers: submit, read, and the approval transitions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use super::publish;
use crate::api::auth::AuthUser;
use crate::api::dto::{RejectRequest, ResubmitRequest, SubmitContributionRequest, TransitionResponse};
use crate::app_state::AppState;
use crate::domain::{ContributionId, ContributionRecord};
use crate::error::{AppError, ErrorResponse};

/// `POST /contributions` — Submit a contribution for review.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input or an unknown / unpublished case.
#[utoipa::path(
    post,
    path = "/api/v1/contributions",
    tag = "Contributions",
    summary = "Submit a contribution",
    description = "Creates a pending contribution and notifies the donor, the admins, and the case creator.",
    request_body = SubmitContributionRequest,
    responses(
        (status = 201, description = "Contribution created", body = TransitionResponse),
        (status = 400, description = "Invalid amount or case not open", body = ErrorResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
    )
)]
pub async fn submit_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SubmitContributionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.workflow.submit(user.id, req.into()).await?;
    publish(&state, &outcome.notifications);
    Ok((StatusCode::CREATED, Json(TransitionResponse::from(&outcome))))
}

/// `GET /contributions/{id}` — Read a contribution with its approval row.
///
/// # Errors
///
/// Returns [`AppError::ContributionNotFound`] or [`AppError::Forbidden`].
#[utoipa::path(
    get,
    path = "/api/v1/contributions/{id}",
    tag = "Contributions",
    summary = "Get a contribution",
    params(("id" = Uuid, Path, description = "Contribution UUID")),
    responses(
        (status = 200, description = "Contribution", body = ContributionRecord),
        (status = 403, description = "Not the donor", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse),
    )
)]
pub async fn get_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .workflow
        .get(ContributionId::from_uuid(id), user.id, user.is_admin())
        .await?;
    Ok(Json(record))
}

/// `POST /contributions/{id}/approve` — Approve a pending contribution (admin).
///
/// # Errors
///
/// Returns [`AppError::InvalidState`] if the contribution is not pending.
#[utoipa::path(
    post,
    path = "/api/v1/contributions/{id}/approve",
    tag = "Contributions",
    summary = "Approve a contribution",
    description = "Moves a pending contribution to approved, recomputes the case total, and notifies the donor.",
    params(("id" = Uuid, Path, description = "Contribution UUID")),
    responses(
        (status = 200, description = "Approved", body = TransitionResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse),
        (status = 409, description = "Contribution is not pending", body = ErrorResponse),
    )
)]
pub async fn approve_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let outcome = state
        .workflow
        .approve(ContributionId::from_uuid(id), user.id)
        .await?;
    publish(&state, &outcome.notifications);
    Ok(Json(TransitionResponse::from(&outcome)))
}

/// `POST /contributions/{id}/reject` — Reject a pending contribution (admin).
///
/// # Errors
///
/// Returns [`AppError::Validation`] for a blank reason, or
/// [`AppError::InvalidState`] if the contribution is not pending.
#[utoipa::path(
    post,
    path = "/api/v1/contributions/{id}/reject",
    tag = "Contributions",
    summary = "Reject a contribution",
    params(("id" = Uuid, Path, description = "Contribution UUID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected", body = TransitionResponse),
        (status = 400, description = "Missing reason", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 409, description = "Contribution is not pending", body = ErrorResponse),
    )
)]
pub async fn reject_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let outcome = state
        .workflow
        .reject(ContributionId::from_uuid(id), user.id, &req.reason, req.comment)
        .await?;
    publish(&state, &outcome.notifications);
    Ok(Json(TransitionResponse::from(&outcome)))
}

/// `POST /contributions/{id}/resubmit` — Send new proof for a rejected
/// contribution (donor).
///
/// # Errors
///
/// Returns [`AppError::Validation`] if the caller is not the donor, or
/// [`AppError::InvalidState`] if the contribution is not rejected.
#[utoipa::path(
    post,
    path = "/api/v1/contributions/{id}/resubmit",
    tag = "Contributions",
    summary = "Resubmit a rejected contribution",
    params(("id" = Uuid, Path, description = "Contribution UUID")),
    request_body = ResubmitRequest,
    responses(
        (status = 200, description = "Back under review", body = TransitionResponse),
        (status = 400, description = "Not the donor or missing proof", body = ErrorResponse),
        (status = 409, description = "Contribution is not rejected", body = ErrorResponse),
    )
)]
pub async fn resubmit_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ResubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .workflow
        .resubmit(ContributionId::from_uuid(id), user.id, &req.proof_url, req.reply)
        .await?;
    publish(&state, &outcome.notifications);
    Ok(Json(TransitionResponse::from(&outcome)))
}

/// `POST /contributions/{id}/acknowledge` — Dismiss a decision (donor).
///
/// # Errors
///
/// Returns [`AppError::InvalidState`] unless the contribution is approved
/// or rejected.
#[utoipa::path(
    post,
    path = "/api/v1/contributions/{id}/acknowledge",
    tag = "Contributions",
    summary = "Acknowledge a decision",
    params(("id" = Uuid, Path, description = "Contribution UUID")),
    responses(
        (status = 200, description = "Acknowledged", body = TransitionResponse),
        (status = 400, description = "Not the donor", body = ErrorResponse),
        (status = 409, description = "No decision to acknowledge", body = ErrorResponse),
    )
)]
pub async fn acknowledge_contribution(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .workflow
        .acknowledge(ContributionId::from_uuid(id), user.id)
        .await?;
    Ok(Json(TransitionResponse::from(&outcome)))
}

/// Contribution routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contributions", post(submit_contribution))
        .route("/contributions/{id}", get(get_contribution))
        .route("/contributions/{id}/approve", post(approve_contribution))
        .route("/contributions/{id}/reject", post(reject_contribution))
        .route("/contributions/{id}/resubmit", post(resubmit_contribution))
        .route("/contributions/{id}/acknowledge", post(acknowledge_contribution))
}
