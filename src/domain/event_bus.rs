//! Broadcast channel for newly created notifications.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Route handlers
//! publish every notification a workflow operation created, and each
//! WebSocket connection subscribes and forwards the ones addressed to its
//! user. Delivery is best-effort: a publish with no listeners, or a lagging
//! listener, never affects the stored notification.

use tokio::sync::broadcast;

use super::Notification;

/// Broadcast bus for created [`Notification`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest events are
/// dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a notification to all subscribers.
    ///
    /// Returns the number of receivers that received it. If there are no
    /// active receivers, the notification is silently dropped.
    pub fn publish(&self, notification: Notification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }

    /// Publishes each notification in order, returning the total fan-out.
    pub fn publish_all(&self, notifications: impl IntoIterator<Item = Notification>) -> usize {
        notifications.into_iter().map(|n| self.publish(n)).sum()
    }

    /// Creates a new receiver that will receive all future notifications.
    ///
    /// Each WebSocket connection should call this once on connect.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{NotificationId, NotificationKind, UserId};
    use chrono::Utc;

    fn make_notification(recipient_id: UserId) -> Notification {
        Notification {
            id: NotificationId::new(),
            recipient_id,
            kind: NotificationKind::ContributionApproved,
            title: "Contribution approved".to_string(),
            message: "Thank you".to_string(),
            data: serde_json::json!({}),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(make_notification(UserId::new())), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_notification() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        let user = UserId::new();
        bus.publish(make_notification(user));

        let Ok(received) = rx.recv().await else {
            panic!("expected to receive notification");
        };
        assert_eq!(received.recipient_id, user);
    }

    #[tokio::test]
    async fn publish_all_fans_out_to_every_subscriber() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();

        let count = bus.publish_all(vec![
            make_notification(UserId::new()),
            make_notification(UserId::new()),
        ]);
        assert_eq!(count, 4);

        let Ok(first) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        assert_eq!(first.kind, NotificationKind::ContributionApproved);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
