//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Pagination and filter query parameters for the notification inbox.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InboxParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Only return unread notifications.
    #[serde(default)]
    pub unread_only: bool,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: i64,
    /// Total number of pages.
    pub total_pages: i64,
}

impl PaginationMeta {
    /// Builds the metadata for `total` items split into pages of
    /// `per_page`.
    #[must_use]
    pub fn new(page: u32, per_page: u32, total: i64) -> Self {
        let per_page_wide = i64::from(per_page.max(1));
        let total_pages = if total <= 0 {
            0
        } else {
            total.saturating_add(per_page_wide - 1) / per_page_wide
        };
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}
