//! Domain layer: identifiers, records, approval states, rules, and the
//! notification event bus.
//!
//! Everything here is free of I/O. The persistence layer maps database rows
//! into these types and the service layer orchestrates them.

pub mod approval;
pub mod case;
pub mod contribution;
pub mod event_bus;
pub mod ids;
pub mod notification;
pub mod role;
pub mod rule;

pub use approval::{ApprovalAction, ApprovalState};
pub use case::{Case, CaseDrift, CaseStatus, Recalculation};
pub use contribution::{
    ApprovalStatus, ApprovalUpdate, Contribution, ContributionRecord, NewContribution,
};
pub use event_bus::EventBus;
pub use ids::{CaseId, ContributionId, NotificationId, UserId};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use role::Role;
pub use rule::{NotificationRule, RuleContext};
