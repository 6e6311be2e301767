//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding the user's notifications.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{ClientFrame, WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{Notification, UserId};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards notifications addressed to `user` from the
///   [`broadcast::Receiver`], subject to the connection's kind filter.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<Notification>,
    user: UserId,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new(user);
    tracing::debug!(user = %user, "ws connection opened");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(notification) => {
                        if !subs.matches(&notification) {
                            continue;
                        }
                        let msg = WsMessage::new(
                            notification.id.to_string(),
                            WsMessageType::Notification,
                            serde_json::to_value(&notification).unwrap_or_default(),
                        );
                        let json = serde_json::to_string(&msg).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(user = %user, lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(user = %user, "ws connection closed");
}

/// Handles a text frame from the client, returning an optional JSON response.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> Option<String> {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            let err = WsMessage::new(
                String::new(),
                WsMessageType::Error,
                serde_json::json!({ "code": 400, "message": e.to_string() }),
            );
            return serde_json::to_string(&err).ok();
        }
    };

    let payload = match frame.command {
        WsCommand::Subscribe { kinds } => {
            subs.subscribe(&kinds);
            serde_json::json!({ "subscribed": kinds, "active": subs.active_kinds() })
        }
        WsCommand::Unsubscribe { kinds } => {
            subs.unsubscribe(&kinds);
            serde_json::json!({ "unsubscribed": kinds, "active": subs.active_kinds() })
        }
        WsCommand::Ping => serde_json::json!({ "pong": true }),
    };
    let response = WsMessage::new(frame.id, WsMessageType::Response, payload);
    serde_json::to_string(&response).ok()
}
