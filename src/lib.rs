//! # charity-gateway
//!
//! REST API and WebSocket service for a charity platform's contribution
//! approval workflow.
//!
//! Donors submit contributions to published fundraising cases. Admins
//! approve or reject them; rejected contributions can be resubmitted with
//! new proof. Every transition keeps the case's collected total in sync
//! with the sum of approved contributions and emits in-app notifications,
//! which are stored per recipient and pushed to open WebSocket connections.
//! Case changes are additionally matched against admin-configured
//! notification rules.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ApprovalWorkflow ─┬─ CaseAggregateUpdater
//!     ├── RuleDispatcher ───┴─ NotificationEmitter   (service/)
//!     ├── EventBus (domain/)
//!     │
//!     └── Store: PostgreSQL | in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
