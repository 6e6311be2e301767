//! Case handlers: read, status change, total recomputation.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use uuid::Uuid;

use super::publish;
use crate::api::auth::AuthUser;
use crate::api::dto::{CaseStatusRequest, CaseStatusResponse};
use crate::app_state::AppState;
use crate::domain::{Case, CaseDrift, CaseId, Recalculation};
use crate::error::{AppError, ErrorResponse};

/// `GET /cases/{id}` — Read a case with its current total.
///
/// # Errors
///
/// Returns [`AppError::CaseNotFound`] if the case does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/cases/{id}",
    tag = "Cases",
    summary = "Get a case",
    params(("id" = Uuid, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Case", body = Case),
        (status = 404, description = "Case not found", body = ErrorResponse),
    )
)]
pub async fn get_case(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let case = state.cases.get(CaseId::from_uuid(id)).await?;
    Ok(Json(case))
}

/// `PATCH /cases/{id}/status` — Change a case's status (admin).
///
/// Fires the `case_updated` notification rules for the `status` field.
///
/// # Errors
///
/// Returns [`AppError::CaseNotFound`] if the case does not exist.
#[utoipa::path(
    patch,
    path = "/api/v1/cases/{id}/status",
    tag = "Cases",
    summary = "Change case status",
    params(("id" = Uuid, Path, description = "Case UUID")),
    request_body = CaseStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = CaseStatusResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
    )
)]
pub async fn update_case_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CaseStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let (case, created) = state
        .rules
        .update_case_status(CaseId::from_uuid(id), req.status, user.id)
        .await?;
    publish(&state, &created);
    Ok(Json(CaseStatusResponse {
        case,
        notifications_created: created.len(),
    }))
}

/// `POST /cases/{id}/recalculate` — Recompute the case total (admin).
///
/// # Errors
///
/// Returns [`AppError::CaseNotFound`] if the case does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/cases/{id}/recalculate",
    tag = "Cases",
    summary = "Recompute case total",
    description = "Rewrites current_amount as the sum of approved contributions. Safe to repeat.",
    params(("id" = Uuid, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Recomputed", body = Recalculation),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
    )
)]
pub async fn recalculate_case(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let recalc = state.cases.recalculate(CaseId::from_uuid(id)).await?;
    Ok(Json(recalc))
}

/// `GET /cases/{id}/drift` — Compare the stored total with the credited
/// contributions (admin). Writes nothing.
///
/// # Errors
///
/// Returns [`AppError::CaseNotFound`] if the case does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/cases/{id}/drift",
    tag = "Cases",
    summary = "Check case total",
    params(("id" = Uuid, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Comparison", body = CaseDrift),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
    )
)]
pub async fn case_drift(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    Ok(Json(state.cases.drift(CaseId::from_uuid(id)).await?))
}

/// Case routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cases/{id}", get(get_case))
        .route("/cases/{id}/status", patch(update_case_status))
        .route("/cases/{id}/recalculate", post(recalculate_case))
        .route("/cases/{id}/drift", get(case_drift))
}
