//! Token issuance.
//!
//! Signing and recording form one unit: a signed token is only handed out
//! once its `issued_tokens` row has been written. If the write fails the
//! token is dropped and the caller sees a store error.

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::claims::build_claims;
use crate::db::{NewIssuedToken, TokenStore};
use crate::directory::UserDirectory;
use crate::error::AuthError;
use crate::jwt::{JwtConfig, TokenPurpose};

/// A freshly issued, recorded token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Tokens handed out on login.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub refresh: IssuedToken,
    pub access: IssuedToken,
}

pub struct TokenIssuer<'a, D> {
    jwt: &'a JwtConfig,
    directory: &'a D,
    tokens: TokenStore,
}

impl<'a, D: UserDirectory> TokenIssuer<'a, D> {
    pub fn new(jwt: &'a JwtConfig, directory: &'a D, tokens: TokenStore) -> Self {
        Self {
            jwt,
            directory,
            tokens,
        }
    }

    /// Sign a token for `username` and record it in the credential store.
    pub async fn issue(
        &self,
        username: &str,
        purpose: TokenPurpose,
    ) -> Result<IssuedToken, AuthError> {
        let settings = self.jwt.settings();
        let token_type = settings.type_tag(purpose);

        let claims = build_claims(self.directory, username, token_type).await?;
        let expires_at = Utc::now() + settings.lifetime(purpose);

        let token = self.jwt.sign(&claims, expires_at).map_err(|e| {
            error!(owner = %claims.name, purpose = purpose.as_str(), error = %e, "Failed to sign token");
            AuthError::from(e)
        })?;

        self.tokens
            .insert(NewIssuedToken {
                owner_name: &claims.name,
                value: &token,
                token_type,
                expires_at,
            })
            .await
            .map_err(|e| {
                error!(owner = %claims.name, purpose = purpose.as_str(), error = %e, "Failed to record issued token");
                AuthError::Store(e)
            })?;

        debug!(owner = %claims.name, purpose = purpose.as_str(), jti = %claims.jti, "Issued token");

        Ok(IssuedToken { token, expires_at })
    }

    /// Issue the refresh and access token returned by a successful login.
    pub async fn issue_pair(&self, username: &str) -> Result<IssuedPair, AuthError> {
        let refresh = self.issue(username, TokenPurpose::Refresh).await?;
        let access = self.issue(username, TokenPurpose::Access).await?;
        Ok(IssuedPair { refresh, access })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::RevocationManager;
    use crate::db::{Database, ROLE_CUSTOMER, ROLE_MANAGER};
    use crate::jwt::JwtSettings;

    async fn setup() -> (Database, JwtConfig) {
        let db = Database::open(":memory:").await.unwrap();
        db.users()
            .create("alice", "alice@example.com", "unused-hash", ROLE_CUSTOMER)
            .await
            .unwrap();
        let jwt = JwtConfig::new(b"issuer-test-secret-issuer-test-secret", JwtSettings::default())
            .unwrap();
        (db, jwt)
    }

    #[tokio::test]
    async fn test_issued_token_is_recorded_and_usable() {
        let (db, jwt) = setup().await;
        let users = db.users();
        let issuer = TokenIssuer::new(&jwt, &users, db.tokens());

        let issued = issuer.issue("alice", TokenPurpose::Access).await.unwrap();

        let record = db.tokens().get_by_value(&issued.token).await.unwrap().unwrap();
        assert_eq!(record.owner_name, "alice");
        assert_eq!(record.token_type, "access");
        assert!(!record.is_revoked);
        assert_eq!(record.expires_at.timestamp(), issued.expires_at.timestamp());

        let manager = RevocationManager::new(db.tokens());
        assert!(manager.is_usable(&issued.token).await.unwrap());

        let claims = jwt.validate(&issued.token).unwrap();
        assert_eq!(claims.claims.name, "alice");
        assert_eq!(claims.claims.roles, vec!["customer"]);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(jwt.purpose_of(&claims), Some(TokenPurpose::Access));
    }

    #[tokio::test]
    async fn test_lifetimes_follow_purpose() {
        let (db, jwt) = setup().await;
        let users = db.users();
        let issuer = TokenIssuer::new(&jwt, &users, db.tokens());

        let pair = issuer.issue_pair("alice").await.unwrap();
        let settings = jwt.settings();
        let refresh_window = pair.refresh.expires_at - Utc::now();
        let access_window = pair.access.expires_at - Utc::now();

        assert!(refresh_window > settings.refresh_ttl - chrono::TimeDelta::seconds(5));
        assert!(access_window <= settings.access_ttl);
        assert_eq!(db.tokens().list_by_owner("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_roles_are_captured_at_issuance() {
        let (db, jwt) = setup().await;
        let users = db.users();
        let issuer = TokenIssuer::new(&jwt, &users, db.tokens());

        let issued = issuer.issue("alice", TokenPurpose::Access).await.unwrap();
        users.add_role("alice", ROLE_MANAGER).await.unwrap();

        let claims = jwt.validate(&issued.token).unwrap();
        assert_eq!(claims.claims.roles, vec!["customer"]);

        let later = issuer.issue("alice", TokenPurpose::Access).await.unwrap();
        let claims = jwt.validate(&later.token).unwrap();
        assert_eq!(claims.claims.roles, vec!["manager", "customer"]);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (db, jwt) = setup().await;
        let users = db.users();
        let issuer = TokenIssuer::new(&jwt, &users, db.tokens());

        let result = issuer.issue("ghost", TokenPurpose::Access).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_store_failure_fails_issuance() {
        let (db, jwt) = setup().await;
        sqlx::query("DROP TABLE issued_tokens")
            .execute(db.pool())
            .await
            .unwrap();

        let users = db.users();
        let issuer = TokenIssuer::new(&jwt, &users, db.tokens());
        let result = issuer.issue("alice", TokenPurpose::Refresh).await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }
}
