//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health` and `/ws`
//! sit at the root. The OpenAPI document is generated with `utoipa` and
//! served by Swagger UI when the `swagger-ui` feature is enabled.

pub mod auth;
pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the REST API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "charity-gateway", description = "Contribution approval and notification service"),
    paths(
        handlers::system::health_handler,
        handlers::contributions::submit_contribution,
        handlers::contributions::get_contribution,
        handlers::contributions::approve_contribution,
        handlers::contributions::reject_contribution,
        handlers::contributions::resubmit_contribution,
        handlers::contributions::acknowledge_contribution,
        handlers::cases::get_case,
        handlers::cases::update_case_status,
        handlers::cases::recalculate_case,
        handlers::cases::case_drift,
        handlers::notifications::list_notifications,
        handlers::notifications::unread_count,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::delete_notification,
        handlers::rules::list_rules,
        handlers::rules::create_rule,
        handlers::rules::update_rule,
        handlers::rules::delete_rule,
    ),
    tags(
        (name = "System", description = "Health"),
        (name = "Contributions", description = "Contribution intake and approval"),
        (name = "Cases", description = "Fundraising cases"),
        (name = "Notifications", description = "Caller's notification inbox"),
        (name = "Notification rules", description = "Admin-configured notification rules"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, docs, and middleware.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::EventBus;
    use crate::persistence::{MemoryStore, Store};

    fn app() -> Router {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::new(store, Duration::from_secs(60), EventBus::new(8));
        build_app(state, Duration::from_secs(5))
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        let Ok(response) = app().oneshot(request).await else {
            panic!("router is infallible");
        };
        response.status()
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/contributions",
            "/api/v1/contributions/{id}/approve",
            "/api/v1/cases/{id}/recalculate",
            "/api/v1/cases/{id}/drift",
            "/api/v1/notifications/unread-count",
            "/api/v1/notification-rules/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let Ok(request) = Request::get("/health").body(Body::empty()) else {
            panic!("request");
        };
        assert_eq!(status_of(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn inbox_requires_identity() {
        let Ok(request) = Request::get("/api/v1/notifications").body(Body::empty()) else {
            panic!("request");
        };
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rules_require_admin() {
        let Ok(request) = Request::get("/api/v1/notification-rules")
            .header(auth::USER_ID_HEADER, uuid::Uuid::new_v4().to_string())
            .header(auth::USER_ROLE_HEADER, "moderator")
            .body(Body::empty())
        else {
            panic!("request");
        };
        assert_eq!(status_of(request).await, StatusCode::FORBIDDEN);
    }
}
