//! REST endpoint handlers organized by resource.

pub mod cases;
pub mod contributions;
pub mod notifications;
pub mod rules;
pub mod system;

use axum::Router;

use crate::app_state::AppState;
use crate::domain::Notification;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(contributions::routes())
        .merge(cases::routes())
        .merge(notifications::routes())
        .merge(rules::routes())
}

/// Hands freshly created notifications to realtime delivery.
fn publish(state: &AppState, notifications: &[Notification]) {
    if notifications.is_empty() {
        return;
    }
    let receivers = state.event_bus.publish_all(notifications.iter().cloned());
    tracing::debug!(count = notifications.len(), receivers, "notifications published");
}
