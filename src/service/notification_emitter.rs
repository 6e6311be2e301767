//! Notification emitter and the recipient-scoped inbox operations.

use std::sync::Arc;

use crate::domain::{NewNotification, Notification, NotificationId, UserId};
use crate::error::AppError;
use crate::persistence::Store;

/// Upper bound for `per_page` on inbox listings.
pub const MAX_PER_PAGE: u32 = 100;

/// Result of [`NotificationEmitter::emit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    /// A new row was inserted.
    Created(Notification),
    /// An equivalent pending notice already existed; nothing was inserted.
    Deduplicated(NotificationId),
}

impl Emitted {
    /// The newly created notification, if any.
    #[must_use]
    pub fn created(self) -> Option<Notification> {
        match self {
            Self::Created(n) => Some(n),
            Self::Deduplicated(_) => None,
        }
    }
}

/// One page of a recipient's inbox.
#[derive(Debug, Clone)]
pub struct InboxPage {
    /// Notifications on this page, newest first.
    pub items: Vec<Notification>,
    /// Total matching notifications across all pages.
    pub total: i64,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

/// Creates notification rows and serves the recipient's inbox.
#[derive(Debug, Clone)]
pub struct NotificationEmitter {
    store: Arc<dyn Store>,
}

impl NotificationEmitter {
    /// Creates an emitter over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Inserts one notification.
    ///
    /// Kinds that are deduplicated per (contribution, recipient) are first
    /// checked against existing rows; the store's insert repeats the check
    /// atomically so concurrent emitters cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the lookup or insert fails.
    pub async fn emit(&self, new: NewNotification) -> Result<Emitted, AppError> {
        let dedup_key = new
            .kind
            .is_deduplicated()
            .then(|| new.contribution_id())
            .flatten();

        if let Some(contribution_id) = dedup_key
            && let Some(existing) = self
                .store
                .find_contribution_notification(new.recipient_id, new.kind, contribution_id)
                .await?
        {
            tracing::debug!(
                notification_id = %existing.id,
                recipient_id = %new.recipient_id,
                kind = %new.kind,
                "notification deduplicated"
            );
            return Ok(Emitted::Deduplicated(existing.id));
        }

        match self.store.insert_notification(&new).await? {
            Some(created) => {
                tracing::debug!(
                    notification_id = %created.id,
                    recipient_id = %created.recipient_id,
                    kind = %created.kind,
                    "notification created"
                );
                Ok(Emitted::Created(created))
            }
            None => {
                // Lost the race against a concurrent insert of the same notice.
                let existing = match dedup_key {
                    Some(contribution_id) => self
                        .store
                        .find_contribution_notification(
                            new.recipient_id,
                            new.kind,
                            contribution_id,
                        )
                        .await?
                        .map(|n| n.id),
                    None => None,
                };
                existing.map(Emitted::Deduplicated).ok_or_else(|| {
                    AppError::Persistence(format!(
                        "{} notification for {} was neither inserted nor found",
                        new.kind, new.recipient_id
                    ))
                })
            }
        }
    }

    /// Lists the recipient's notifications, newest first.
    ///
    /// `page` is 1-based; `per_page` is clamped to `1..=MAX_PER_PAGE`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    pub async fn list(
        &self,
        recipient: UserId,
        unread_only: bool,
        page: u32,
        per_page: u32,
    ) -> Result<InboxPage, AppError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let offset = i64::from(page.saturating_sub(1)).saturating_mul(i64::from(per_page));

        let items = self
            .store
            .list_notifications(recipient, unread_only, i64::from(per_page), offset)
            .await?;
        let total = self.store.count_notifications(recipient, unread_only).await?;

        Ok(InboxPage {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Number of unread notifications for the recipient.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    pub async fn unread_count(&self, recipient: UserId) -> Result<i64, AppError> {
        self.store.count_notifications(recipient, true).await
    }

    /// Marks one notification read.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotificationNotFound`] if the recipient has no
    /// such notification.
    pub async fn mark_read(&self, recipient: UserId, id: NotificationId) -> Result<(), AppError> {
        if self.store.mark_notification_read(recipient, id).await? {
            Ok(())
        } else {
            Err(AppError::NotificationNotFound(id))
        }
    }

    /// Marks all of the recipient's notifications read.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    pub async fn mark_all_read(&self, recipient: UserId) -> Result<u64, AppError> {
        self.store.mark_all_notifications_read(recipient).await
    }

    /// Deletes one notification.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotificationNotFound`] if the recipient has no
    /// such notification.
    pub async fn delete(&self, recipient: UserId, id: NotificationId) -> Result<(), AppError> {
        if self.store.delete_notification(recipient, id).await? {
            Ok(())
        } else {
            Err(AppError::NotificationNotFound(id))
        }
    }
}
