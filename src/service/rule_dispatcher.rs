//! Rule-based notification dispatch.
//!
//! [`RuleDispatcher`] evaluates the admin-configured
//! [`NotificationRule`]s against a change event, resolves the recipients of
//! every matching rule, and hands one notification per recipient to the
//! [`NotificationEmitter`].
//!
//! Rules are read through a per-instance `moka` cache with a TTL taken from
//! configuration. Every rule mutation made through the dispatcher
//! invalidates the cache immediately; edits made elsewhere become visible
//! once the TTL expires.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;

use super::notification_emitter::NotificationEmitter;
use crate::domain::rule::CASE_UPDATED_EVENT;
use crate::domain::{
    Case, CaseId, CaseStatus, NewNotification, Notification, NotificationRule, RuleContext,
    UserId,
};
use crate::error::AppError;
use crate::persistence::Store;

/// Default lifetime of the cached rule set.
pub const DEFAULT_RULES_TTL: Duration = Duration::from_secs(60);

/// Evaluates notification rules and emits their notifications.
#[derive(Debug, Clone)]
pub struct RuleDispatcher {
    store: Arc<dyn Store>,
    emitter: NotificationEmitter,
    cache: Cache<(), Arc<Vec<NotificationRule>>>,
    // Serializes load-modify-save cycles of rule administration.
    write_lock: Arc<Mutex<()>>,
}

impl RuleDispatcher {
    /// Creates a dispatcher whose rule cache expires after `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, emitter: NotificationEmitter, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            store,
            emitter,
            cache,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Drops the cached rule set so the next evaluation reloads it.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }

    async fn enabled_rules(&self) -> Result<Arc<Vec<NotificationRule>>, AppError> {
        let store = Arc::clone(&self.store);
        self.cache
            .try_get_with((), async move {
                let rules = store.load_notification_rules().await?;
                tracing::debug!(count = rules.len(), "notification rules loaded");
                Ok::<_, AppError>(Arc::new(
                    rules.into_iter().filter(|r| r.enabled).collect::<Vec<_>>(),
                ))
            })
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    /// Returns the enabled rules that match `event` in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the rules cannot be loaded.
    pub async fn evaluate(
        &self,
        event: &str,
        ctx: &RuleContext,
    ) -> Result<Vec<NotificationRule>, AppError> {
        let rules = self.enabled_rules().await?;
        Ok(rules
            .iter()
            .filter(|rule| rule.matches(event, ctx))
            .cloned()
            .collect())
    }

    /// Resolves a rule's targets to a de-duplicated recipient list.
    async fn recipients(
        &self,
        rule: &NotificationRule,
        ctx: &RuleContext,
    ) -> Result<Vec<UserId>, AppError> {
        let targets = &rule.targets;
        let mut candidates = targets.notify_specific_users.clone();
        if targets.notify_creator
            && let Some(creator) = ctx.creator_id
        {
            candidates.push(creator);
        }
        if !targets.notify_specific_roles.is_empty() {
            candidates.extend(
                self.store
                    .user_ids_with_roles(&targets.notify_specific_roles)
                    .await?,
            );
        }
        if targets.notify_all_users {
            candidates.extend(self.store.all_user_ids().await?);
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        candidates.retain(|id| seen.insert(*id));
        Ok(candidates)
    }

    async fn try_dispatch(
        &self,
        event: &str,
        ctx: &RuleContext,
    ) -> Result<Vec<Notification>, AppError> {
        let mut created = Vec::new();
        for rule in self.evaluate(event, ctx).await? {
            let (title, message) = rule.notification.render(ctx);
            let recipients = self.recipients(&rule, ctx).await?;
            tracing::debug!(rule_id = %rule.id, event, recipients = recipients.len(), "rule matched");

            for recipient in recipients {
                let emitted = self
                    .emitter
                    .emit(NewNotification {
                        recipient_id: recipient,
                        kind: rule.notification.kind,
                        title: title.clone(),
                        message: message.clone(),
                        data: serde_json::json!({
                            "rule_id": rule.id,
                            "event": event,
                            "case_id": ctx.case_id,
                            "field": ctx.field,
                            "from": ctx.from_value,
                            "to": ctx.to_value,
                        }),
                    })
                    .await?;
                created.extend(emitted.created());
            }
        }
        Ok(created)
    }

    /// Evaluates `event` and emits the notifications of every matching rule.
    ///
    /// Never fails: errors are logged at `warn` and yield an empty list.
    /// Rows inserted before the failure stay stored.
    pub async fn dispatch(&self, event: &str, ctx: &RuleContext) -> Vec<Notification> {
        match self.try_dispatch(event, ctx).await {
            Ok(created) => created,
            Err(err) => {
                tracing::warn!(event, error = %err, "rule dispatch failed");
                Vec::new()
            }
        }
    }

    /// Changes a case's status and dispatches the `case_updated` event.
    ///
    /// Returns the updated case and the notifications the rules created.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CaseNotFound`] if the case does not exist, or
    /// [`AppError::Persistence`] if the status write fails.
    pub async fn update_case_status(
        &self,
        case_id: CaseId,
        status: CaseStatus,
        actor: UserId,
    ) -> Result<(Case, Vec<Notification>), AppError> {
        let (previous, case) = self
            .store
            .update_case_status(case_id, status)
            .await?
            .ok_or(AppError::CaseNotFound(case_id))?;
        tracing::info!(%case_id, from = %previous, to = %status, %actor, "case status changed");

        let ctx = RuleContext {
            field: Some("status".to_string()),
            from_value: Some(previous.as_str().to_string()),
            to_value: Some(status.as_str().to_string()),
            case_id: Some(case_id),
            case_title: Some(case.display_title().to_string()),
            creator_id: case.created_by,
            actor_id: Some(actor),
        };
        let created = self.dispatch(CASE_UPDATED_EVENT, &ctx).await;
        Ok((case, created))
    }

    /// Every configured rule, enabled or not, read directly from the store.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    pub async fn list_rules(&self) -> Result<Vec<NotificationRule>, AppError> {
        self.store.load_notification_rules().await
    }

    /// Adds a rule. An empty id is replaced by a generated one.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the rule is malformed or its id
    /// is already taken.
    pub async fn create_rule(
        &self,
        mut rule: NotificationRule,
    ) -> Result<NotificationRule, AppError> {
        if rule.id.trim().is_empty() {
            rule.id = uuid::Uuid::new_v4().to_string();
        }
        validate_rule(&rule)?;

        let _guard = self.write_lock.lock().await;
        let mut rules = self.store.load_notification_rules().await?;
        if rules.iter().any(|r| r.id == rule.id) {
            return Err(AppError::Validation(format!(
                "notification rule {} already exists",
                rule.id
            )));
        }
        rules.push(rule.clone());
        self.persist(&rules).await?;
        tracing::info!(rule_id = %rule.id, "notification rule created");
        Ok(rule)
    }

    /// Replaces the rule with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RuleNotFound`] if no rule has that id, or
    /// [`AppError::Validation`] if the new rule is malformed.
    pub async fn update_rule(
        &self,
        id: &str,
        mut rule: NotificationRule,
    ) -> Result<NotificationRule, AppError> {
        rule.id = id.to_string();
        validate_rule(&rule)?;

        let _guard = self.write_lock.lock().await;
        let mut rules = self.store.load_notification_rules().await?;
        let slot = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::RuleNotFound(id.to_string()))?;
        *slot = rule.clone();
        self.persist(&rules).await?;
        tracing::info!(rule_id = %id, "notification rule updated");
        Ok(rule)
    }

    /// Removes the rule with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RuleNotFound`] if no rule has that id.
    pub async fn delete_rule(&self, id: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut rules = self.store.load_notification_rules().await?;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Err(AppError::RuleNotFound(id.to_string()));
        }
        self.persist(&rules).await?;
        tracing::info!(rule_id = %id, "notification rule deleted");
        Ok(())
    }

    async fn persist(&self, rules: &[NotificationRule]) -> Result<(), AppError> {
        self.store.save_notification_rules(rules).await?;
        self.invalidate().await;
        Ok(())
    }
}

fn validate_rule(rule: &NotificationRule) -> Result<(), AppError> {
    if rule.name.trim().is_empty() {
        return Err(AppError::Validation("rule name must not be empty".to_string()));
    }
    if rule.trigger.event.trim().is_empty() {
        return Err(AppError::Validation(
            "rule trigger event must not be empty".to_string(),
        ));
    }
    if rule.notification.title.trim().is_empty() {
        return Err(AppError::Validation(
            "rule notification title must not be empty".to_string(),
        ));
    }
    if rule.targets.is_empty() {
        return Err(AppError::Validation("rule must select at least one target".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::rule::{
        ConditionValue, NotificationTemplate, RuleCondition, RuleTargets, RuleTrigger,
    };
    use crate::domain::{NotificationKind, Role};
    use crate::persistence::memory::MemoryStore;
    use rust_decimal_macros::dec;

    fn dispatcher_with_ttl(ttl: Duration) -> (Arc<MemoryStore>, RuleDispatcher) {
        let store = Arc::new(MemoryStore::new());
        let dyn_store = Arc::clone(&store) as Arc<dyn Store>;
        let emitter = NotificationEmitter::new(Arc::clone(&dyn_store));
        (store, RuleDispatcher::new(dyn_store, emitter, ttl))
    }

    fn closed_rule(targets: RuleTargets) -> NotificationRule {
        NotificationRule {
            id: "case-closed".to_string(),
            name: "Case closed".to_string(),
            enabled: true,
            trigger: RuleTrigger {
                event: CASE_UPDATED_EVENT.to_string(),
                field: Some("status".to_string()),
                conditions: vec![RuleCondition {
                    field: Some("status".to_string()),
                    operator: "changed_to".to_string(),
                    value: None,
                    from_value: None,
                    to_value: Some(ConditionValue::Many(vec!["closed".to_string()])),
                }],
            },
            targets,
            notification: NotificationTemplate {
                kind: NotificationKind::CaseUpdate,
                title: "Case closed".to_string(),
                message: "{case_title} moved from {from} to {to}".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn status_change_to_closed_notifies_deduplicated_targets() {
        let (store, dispatcher) = dispatcher_with_ttl(DEFAULT_RULES_TTL);
        let creator = UserId::new();
        let admin = UserId::new();
        store.insert_profile(creator, Role::Admin).await;
        store.insert_profile(admin, Role::Admin).await;
        let case = store
            .create_case("Clean water", dec!(1000), CaseStatus::Published, Some(creator))
            .await;

        let Ok(_) = dispatcher
            .create_rule(closed_rule(RuleTargets {
                notify_creator: true,
                notify_specific_roles: vec!["admin".to_string()],
                ..RuleTargets::default()
            }))
            .await
        else {
            panic!("create_rule failed");
        };

        let Ok((updated, created)) = dispatcher
            .update_case_status(case.id, CaseStatus::Closed, admin)
            .await
        else {
            panic!("status update failed");
        };
        assert_eq!(updated.status, CaseStatus::Closed);
        // Creator is also an admin: notified once.
        assert_eq!(created.len(), 2);
        let Some(first) = created.first() else {
            panic!("expected notifications");
        };
        assert_eq!(first.message, "Clean water moved from published to closed");
    }

    #[tokio::test]
    async fn malformed_stored_rule_does_not_disable_the_others() {
        let (store, dispatcher) = dispatcher_with_ttl(DEFAULT_RULES_TTL);
        let creator = UserId::new();
        let case = store
            .create_case("Clean water", dec!(1000), CaseStatus::Published, Some(creator))
            .await;
        let Ok(valid) = serde_json::to_value(closed_rule(RuleTargets {
            notify_creator: true,
            ..RuleTargets::default()
        })) else {
            panic!("rule should serialize");
        };
        store
            .set_rules_config(serde_json::json!([
                {
                    "id": "broken",
                    "name": "Broken targets",
                    "trigger": { "event": "case_updated" },
                    "targets": { "notifySpecificUsers": ["not-a-uuid"] },
                    "notification": { "title": "x", "message": "y" }
                },
                valid,
            ]))
            .await;

        let Ok(rules) = dispatcher.list_rules().await else {
            panic!("list_rules failed");
        };
        assert_eq!(rules.len(), 1);

        let Ok((_, created)) = dispatcher
            .update_case_status(case.id, CaseStatus::Closed, UserId::new())
            .await
        else {
            panic!("status update failed");
        };
        assert_eq!(created.len(), 1);
        assert_eq!(created.first().map(|n| n.recipient_id), Some(creator));
    }

    #[tokio::test]
    async fn non_closed_transition_does_not_fire() {
        let (store, dispatcher) = dispatcher_with_ttl(DEFAULT_RULES_TTL);
        let creator = UserId::new();
        let case = store
            .create_case("Clinic", dec!(500), CaseStatus::Draft, Some(creator))
            .await;
        let Ok(_) = dispatcher
            .create_rule(closed_rule(RuleTargets {
                notify_creator: true,
                ..RuleTargets::default()
            }))
            .await
        else {
            panic!("create_rule failed");
        };

        let Ok((_, created)) = dispatcher
            .update_case_status(case.id, CaseStatus::Published, creator)
            .await
        else {
            panic!("status update failed");
        };
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn rules_are_cached_until_invalidated() {
        let (store, dispatcher) = dispatcher_with_ttl(Duration::from_secs(3600));
        let ctx = RuleContext::default();

        let Ok(_) = dispatcher.evaluate(CASE_UPDATED_EVENT, &ctx).await else {
            panic!("evaluate failed");
        };
        let Ok(_) = dispatcher.evaluate(CASE_UPDATED_EVENT, &ctx).await else {
            panic!("evaluate failed");
        };
        assert_eq!(store.rule_loads(), 1);

        dispatcher.invalidate().await;
        let Ok(_) = dispatcher.evaluate(CASE_UPDATED_EVENT, &ctx).await else {
            panic!("evaluate failed");
        };
        assert_eq!(store.rule_loads(), 2);
    }

    #[tokio::test]
    async fn rules_reload_after_ttl() {
        let (store, dispatcher) = dispatcher_with_ttl(Duration::from_millis(50));
        let ctx = RuleContext::default();
        let Ok(_) = dispatcher.evaluate(CASE_UPDATED_EVENT, &ctx).await else {
            panic!("evaluate failed");
        };
        tokio::time::sleep(Duration::from_millis(120)).await;
        let Ok(_) = dispatcher.evaluate(CASE_UPDATED_EVENT, &ctx).await else {
            panic!("evaluate failed");
        };
        assert_eq!(store.rule_loads(), 2);
    }

    #[tokio::test]
    async fn instances_do_not_share_caches() {
        let (_store_a, a) = dispatcher_with_ttl(DEFAULT_RULES_TTL);
        let (_store_b, b) = dispatcher_with_ttl(DEFAULT_RULES_TTL);
        let Ok(_) = a
            .create_rule(closed_rule(RuleTargets {
                notify_all_users: true,
                ..RuleTargets::default()
            }))
            .await
        else {
            panic!("create_rule failed");
        };
        assert!(matches!(a.list_rules().await, Ok(r) if r.len() == 1));
        assert!(matches!(b.list_rules().await, Ok(r) if r.is_empty()));
    }

    #[tokio::test]
    async fn crud_validates_and_reports_missing_rules() {
        let (_store, dispatcher) = dispatcher_with_ttl(DEFAULT_RULES_TTL);
        let empty_targets = closed_rule(RuleTargets::default());
        assert!(matches!(
            dispatcher.create_rule(empty_targets).await,
            Err(AppError::Validation(_))
        ));

        let rule = closed_rule(RuleTargets {
            notify_creator: true,
            ..RuleTargets::default()
        });
        let Ok(_) = dispatcher.create_rule(rule.clone()).await else {
            panic!("create_rule failed");
        };
        assert!(matches!(
            dispatcher.create_rule(rule.clone()).await,
            Err(AppError::Validation(_))
        ));

        let mut renamed = rule.clone();
        renamed.name = "Closed cases".to_string();
        let Ok(updated) = dispatcher.update_rule("case-closed", renamed).await else {
            panic!("update_rule failed");
        };
        assert_eq!(updated.name, "Closed cases");

        assert!(matches!(
            dispatcher.update_rule("missing", rule).await,
            Err(AppError::RuleNotFound(_))
        ));
        assert!(dispatcher.delete_rule("case-closed").await.is_ok());
        assert!(matches!(
            dispatcher.delete_rule("case-closed").await,
            Err(AppError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_failures_are_swallowed() {
        let (store, dispatcher) = dispatcher_with_ttl(DEFAULT_RULES_TTL);
        let creator = UserId::new();
        let case = store
            .create_case("Food bank", dec!(200), CaseStatus::Published, Some(creator))
            .await;
        let Ok(_) = dispatcher
            .create_rule(closed_rule(RuleTargets {
                notify_creator: true,
                ..RuleTargets::default()
            }))
            .await
        else {
            panic!("create_rule failed");
        };

        store.set_fail_notification_inserts(true);
        let Ok((updated, created)) = dispatcher
            .update_case_status(case.id, CaseStatus::Closed, creator)
            .await
        else {
            panic!("status update should succeed despite dispatch failure");
        };
        assert_eq!(updated.status, CaseStatus::Closed);
        assert!(created.is_empty());
    }
}
