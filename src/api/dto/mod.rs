//! Data Transfer Objects for REST request/response serialization.
//!
//! Monetary amounts are `rust_decimal::Decimal` and serialize as JSON
//! strings; requests accept either strings or numbers.

pub mod common_dto;
pub mod contribution_dto;
pub mod notification_dto;

pub use common_dto::*;
pub use contribution_dto::*;
pub use notification_dto::*;
