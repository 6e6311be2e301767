//! Fundraising cases and the result of recomputing their totals.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{CaseId, UserId};

/// Funding percentages that trigger milestone notifications.
pub const MILESTONES: [u32; 4] = [25, 50, 75, 100];

/// Publication state of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    /// Not yet visible to donors.
    Draft,
    /// Open for contributions.
    Published,
    /// Closed by an admin.
    Closed,
    /// Fully funded and finished.
    Completed,
}

impl CaseStatus {
    /// Returns the string representation stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Closed => "closed",
            Self::Completed => "completed",
        }
    }

    /// Parses a status from its database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "closed" => Some(Self::Closed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fundraising case.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Case {
    /// Case identifier.
    pub id: CaseId,
    /// English title.
    pub title_en: String,
    /// Arabic title.
    pub title_ar: Option<String>,
    /// Fundraising goal.
    pub target_amount: Decimal,
    /// Sum of approved contributions. Derived; never written by hand.
    pub current_amount: Decimal,
    /// Publication state.
    pub status: CaseStatus,
    /// Admin who created the case.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Title used in notification texts.
    #[must_use]
    pub fn display_title(&self) -> &str {
        &self.title_en
    }
}

/// Outcome of a full recompute of `current_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Recalculation {
    /// Recomputed case.
    pub case_id: CaseId,
    /// Stored amount before the recompute.
    pub previous: Decimal,
    /// Amount written by the recompute.
    pub current: Decimal,
    /// The case's fundraising goal.
    pub target: Decimal,
}

/// Stored total compared with the credited contributions, read without
/// writing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CaseDrift {
    /// Checked case.
    pub case_id: CaseId,
    /// `current_amount` as stored.
    pub stored: Decimal,
    /// Sum of approved (including acknowledged) contributions.
    pub credited: Decimal,
    /// `stored - credited`; zero when consistent.
    pub drift: Decimal,
}

impl CaseDrift {
    /// Builds the comparison for a case.
    #[must_use]
    pub fn new(case_id: CaseId, stored: Decimal, credited: Decimal) -> Self {
        Self {
            case_id,
            stored,
            credited,
            drift: stored - credited,
        }
    }

    /// Returns `true` when the stored total matches.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero()
    }
}

impl Recalculation {
    /// Funded percentage for `amount`, or `None` when the case has no target.
    fn percent(&self, amount: Decimal) -> Option<Decimal> {
        if self.target <= Decimal::ZERO {
            return None;
        }
        amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(self.target))
    }

    /// Milestones crossed upward between `previous` and `current`.
    #[must_use]
    pub fn crossed_milestones(&self) -> Vec<u32> {
        let (Some(before), Some(after)) = (self.percent(self.previous), self.percent(self.current))
        else {
            return Vec::new();
        };
        MILESTONES
            .iter()
            .copied()
            .filter(|m| {
                let m = Decimal::from(*m);
                before < m && after >= m
            })
            .collect()
    }
}
