//! Per-connection subscription manager.
//!
//! A connection only ever sees notifications addressed to its own user.
//! On top of that, the client may narrow delivery to a set of
//! [`NotificationKind`]s. A fresh connection receives every kind.

use std::collections::HashSet;

use crate::domain::{Notification, NotificationKind, UserId};

/// Tracks which notifications a single WebSocket connection receives.
#[derive(Debug)]
pub struct SubscriptionManager {
    user: UserId,
    /// `None` means every kind.
    kinds: Option<HashSet<NotificationKind>>,
}

impl SubscriptionManager {
    /// Creates a manager for `user` that receives every kind.
    #[must_use]
    pub fn new(user: UserId) -> Self {
        Self { user, kinds: None }
    }

    /// Adds kinds to the filter. The first call switches from "every kind"
    /// to exactly the given kinds.
    pub fn subscribe(&mut self, kinds: &[NotificationKind]) {
        self.kinds
            .get_or_insert_with(HashSet::new)
            .extend(kinds.iter().copied());
    }

    /// Removes kinds from the filter.
    pub fn unsubscribe(&mut self, kinds: &[NotificationKind]) {
        let set = self
            .kinds
            .get_or_insert_with(|| NotificationKind::ALL.into_iter().collect());
        for kind in kinds {
            set.remove(kind);
        }
    }

    /// Returns `true` if the notification should be delivered.
    #[must_use]
    pub fn matches(&self, notification: &Notification) -> bool {
        notification.recipient_id == self.user
            && self
                .kinds
                .as_ref()
                .is_none_or(|kinds| kinds.contains(&notification.kind))
    }

    /// The kinds currently delivered, in declaration order.
    #[must_use]
    pub fn active_kinds(&self) -> Vec<NotificationKind> {
        NotificationKind::ALL
            .into_iter()
            .filter(|k| self.kinds.as_ref().is_none_or(|kinds| kinds.contains(k)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationId;
    use chrono::Utc;

    fn notification(recipient: UserId, kind: NotificationKind) -> Notification {
        Notification {
            id: NotificationId::new(),
            recipient_id: recipient,
            kind,
            title: String::new(),
            message: String::new(),
            data: serde_json::json!({}),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_connection_gets_all_own_notifications() {
        let me = UserId::new();
        let mgr = SubscriptionManager::new(me);
        assert!(mgr.matches(&notification(me, NotificationKind::CaseMilestone)));
        assert!(!mgr.matches(&notification(UserId::new(), NotificationKind::CaseMilestone)));
        assert_eq!(mgr.active_kinds().len(), NotificationKind::ALL.len());
    }

    #[test]
    fn subscribe_narrows_to_listed_kinds() {
        let me = UserId::new();
        let mut mgr = SubscriptionManager::new(me);
        mgr.subscribe(&[NotificationKind::ContributionApproved]);
        assert!(mgr.matches(&notification(me, NotificationKind::ContributionApproved)));
        assert!(!mgr.matches(&notification(me, NotificationKind::CaseUpdate)));

        mgr.subscribe(&[NotificationKind::CaseUpdate]);
        assert!(mgr.matches(&notification(me, NotificationKind::CaseUpdate)));
    }

    #[test]
    fn unsubscribe_from_everything_removes_kind() {
        let me = UserId::new();
        let mut mgr = SubscriptionManager::new(me);
        mgr.unsubscribe(&[NotificationKind::CaseProgress]);
        assert!(!mgr.matches(&notification(me, NotificationKind::CaseProgress)));
        assert!(mgr.matches(&notification(me, NotificationKind::ContributionRejected)));
        assert_eq!(mgr.active_kinds().len(), NotificationKind::ALL.len() - 1);
    }
}
