//! Authentication user types.

use crate::jwt::TokenClaims;

/// Caller identity established by the gate, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Claims of the presented access token
    pub claims: TokenClaims,
    /// The access token itself
    pub token: String,
}

impl AuthenticatedUser {
    pub fn username(&self) -> &str {
        &self.claims.claims.name
    }
}
