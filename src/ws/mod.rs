//! WebSocket layer: realtime notification delivery.
//!
//! The endpoint at `/ws` pushes each newly created notification to the
//! open connections of its recipient. Clients may narrow delivery to a
//! set of notification kinds with `subscribe` / `unsubscribe` commands.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
