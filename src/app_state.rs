//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::EventBus;
use crate::persistence::Store;
use crate::service::{ApprovalWorkflow, CaseAggregateUpdater, NotificationEmitter, RuleDispatcher};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Contribution approval workflow.
    pub workflow: ApprovalWorkflow,
    /// Case reads and total recomputation.
    pub cases: CaseAggregateUpdater,
    /// Notification inbox.
    pub notifications: NotificationEmitter,
    /// Rule evaluation and administration.
    pub rules: RuleDispatcher,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires every service over one store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, rules_cache_ttl: Duration, event_bus: EventBus) -> Self {
        let notifications = NotificationEmitter::new(Arc::clone(&store));
        let cases = CaseAggregateUpdater::new(Arc::clone(&store));
        let workflow =
            ApprovalWorkflow::new(Arc::clone(&store), notifications.clone(), cases.clone());
        let rules = RuleDispatcher::new(store, notifications.clone(), rules_cache_ttl);
        Self {
            workflow,
            cases,
            notifications,
            rules,
            event_bus,
        }
    }
}
