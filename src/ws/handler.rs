//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::api::auth::AuthUser;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade an authenticated HTTP connection to WebSocket.
///
/// The connection receives only notifications addressed to the caller.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    user: AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    ws.on_upgrade(move |socket| run_connection(socket, event_rx, user.id))
}
