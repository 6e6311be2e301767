//! Service layer: business logic orchestration.
//!
//! [`ApprovalWorkflow`] drives contribution state transitions and calls
//! into [`CaseAggregateUpdater`] and [`NotificationEmitter`].
//! [`RuleDispatcher`] turns case change events into notifications through
//! the same emitter. None of the services publish to the
//! [`super::domain::EventBus`]; they return what they created and the route
//! handlers publish it.

pub mod approval_workflow;
pub mod case_aggregate;
pub mod notification_emitter;
pub mod rule_dispatcher;

pub use approval_workflow::{ApprovalWorkflow, SubmitContribution, TransitionOutcome};
pub use case_aggregate::CaseAggregateUpdater;
pub use notification_emitter::{Emitted, InboxPage, NotificationEmitter};
pub use rule_dispatcher::RuleDispatcher;
