//! User roles as supplied by the upstream auth provider.

use serde::{Deserialize, Serialize};

/// Role claim of an authenticated user.
///
/// Only the admin / non-admin distinction gates workflow operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular donor.
    Donor,
    /// Content moderator; not an admin for approvals.
    Moderator,
    /// Administrator.
    Admin,
    /// Administrator with role management rights.
    SuperAdmin,
}

impl Role {
    /// Roles that may review contributions and manage rules.
    pub const ADMINS: [Self; 2] = [Self::Admin, Self::SuperAdmin];

    /// Returns the string representation stored in `profiles.role`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Donor => "donor",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Parses a role claim. Unknown claims fall back to [`Role::Donor`].
    #[must_use]
    pub fn parse_or_donor(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "moderator" => Self::Moderator,
            "admin" => Self::Admin,
            "super_admin" | "superadmin" => Self::SuperAdmin,
            _ => Self::Donor,
        }
    }

    /// Returns `true` for admin roles.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        Self::ADMINS.contains(self)
    }
}
