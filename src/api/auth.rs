//! Caller identity extracted from headers set by the upstream auth proxy.
//!
//! The proxy authenticates the session and forwards `x-user-id` (a UUID)
//! and `x-user-role`. This service trusts both; it never sees credentials.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::{Role, UserId};
use crate::error::AppError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    /// User id.
    pub id: UserId,
    /// Role claim; missing or unknown roles are treated as donors.
    pub role: Role,
}

impl AuthUser {
    /// Returns `true` for admin callers.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fails unless the caller is an admin.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admin callers.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin role required".to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<uuid::Uuid>().ok())
            .map(UserId::from_uuid)
            .ok_or(AppError::Unauthorized)?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or(Role::Donor, Role::parse_or_donor);

        Ok(Self { id, role })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<AuthUser, AppError> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let Ok(request) = builder.body(()) else {
            panic!("request should build");
        };
        let (mut parts, ()) = request.into_parts();
        AuthUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn missing_or_malformed_id_is_unauthorized() {
        assert!(matches!(extract(&[]).await, Err(AppError::Unauthorized)));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "not-a-uuid")]).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn role_defaults_to_donor() {
        let id = uuid::Uuid::new_v4().to_string();
        let Ok(user) = extract(&[(USER_ID_HEADER, id.as_str())]).await else {
            panic!("extraction failed");
        };
        assert_eq!(user.role, Role::Donor);
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn super_admin_is_admin() {
        let id = uuid::Uuid::new_v4().to_string();
        let Ok(user) = extract(&[(USER_ID_HEADER, id.as_str()), (USER_ROLE_HEADER, "super_admin")]).await
        else {
            panic!("extraction failed");
        };
        assert!(user.require_admin().is_ok());
    }
}
