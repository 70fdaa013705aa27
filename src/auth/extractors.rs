//! Axum extractors for authenticated handlers.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::types::AuthenticatedUser;
use crate::db::{ROLE_ADMIN, ROLE_CUSTOMER, ROLE_MANAGER};
use crate::jwt::ClaimSet;

/// Role requirement checked against the `roles` claim of the access token.
pub trait RoleConstraint: Send + Sync + 'static {
    fn allows(claims: &ClaimSet) -> bool;
}

/// Any authenticated caller.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_: &ClaimSet) -> bool {
        true
    }
}

/// Callers holding the admin role.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(claims: &ClaimSet) -> bool {
        claims.has_role(ROLE_ADMIN)
    }
}

/// Callers holding the manager or the customer role.
pub struct ManagerOrCustomer;

impl RoleConstraint for ManagerOrCustomer {
    fn allows(claims: &ClaimSet) -> bool {
        claims.has_role(ROLE_MANAGER) || claims.has_role(ROLE_CUSTOMER)
    }
}

/// Extractor for handlers behind [`super::require_access_token`].
///
/// Reads the caller the gate stored in the request extensions. A handler on a
/// route without the gate always gets a 401.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub user: AuthenticatedUser,
    _role: PhantomData<R>,
}

impl<R: RoleConstraint> Auth<R> {
    pub fn username(&self) -> &str {
        self.user.username()
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(ApiAuthError::new(AuthErrorKind::MissingToken))?;

        if !R::allows(&user.claims.claims) {
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            user,
            _role: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(roles: &[&str]) -> ClaimSet {
        ClaimSet {
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            jti: "jti".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: vec![],
            token_type: "access".to_string(),
        }
    }

    #[test]
    fn test_role_constraints() {
        assert!(AnyRole::allows(&claims(&[])));

        assert!(AdminOnly::allows(&claims(&["admin"])));
        assert!(AdminOnly::allows(&claims(&["Admin"])));
        assert!(!AdminOnly::allows(&claims(&["manager"])));

        assert!(ManagerOrCustomer::allows(&claims(&["customer"])));
        assert!(ManagerOrCustomer::allows(&claims(&["admin", "manager"])));
        assert!(!ManagerOrCustomer::allows(&claims(&["admin"])));
        assert!(!ManagerOrCustomer::allows(&claims(&[])));
    }
}
