//! Token revocation and usability checks.

use chrono::Utc;
use tracing::info;

use crate::db::TokenStore;
use crate::error::AuthError;

pub struct RevocationManager {
    tokens: TokenStore,
}

impl RevocationManager {
    pub fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }

    /// Whether the store still considers `token` usable: a row exists and is
    /// not revoked. The signature is not checked here; run this alongside
    /// `JwtConfig::validate`, not instead of it.
    pub async fn is_usable(&self, token: &str) -> Result<bool, AuthError> {
        let record = self.tokens.get_by_value(token).await?;
        Ok(record.is_some_and(|r| !r.is_revoked))
    }

    /// Revoke every outstanding token of `owner`. Returns how many rows
    /// changed; a repeated call changes nothing.
    pub async fn revoke_all(&self, owner: &str) -> Result<u64, AuthError> {
        let revoked = self.tokens.revoke_all_by_owner(owner, Utc::now()).await?;
        info!(owner = %owner, revoked, "Revoked tokens");
        Ok(revoked)
    }
}
