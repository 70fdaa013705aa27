//! JWT token signing and validation.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::AuthError;

/// Purpose of a token. The wire value of each purpose is configurable, see
/// [`JwtSettings::type_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Short-lived token authorizing API calls.
    Access,
    /// Long-lived token only accepted by the refresh endpoint.
    Refresh,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
        }
    }
}

/// Default access token lifetime: 5 minutes
pub const ACCESS_TOKEN_DURATION_SECS: i64 = 5 * 60;

/// Default refresh token lifetime: 2 weeks
pub const REFRESH_TOKEN_DURATION_SECS: i64 = 14 * 24 * 60 * 60;

/// Process-wide token settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: TimeDelta,
    pub refresh_ttl: TimeDelta,
    /// Value of the `tokenType` claim for access tokens.
    pub access_type: String,
    /// Value of the `tokenType` claim for refresh tokens.
    pub refresh_type: String,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            issuer: "tokengate".to_string(),
            audience: "tokengate-api".to_string(),
            access_ttl: TimeDelta::seconds(ACCESS_TOKEN_DURATION_SECS),
            refresh_ttl: TimeDelta::seconds(REFRESH_TOKEN_DURATION_SECS),
            access_type: TokenPurpose::Access.as_str().to_string(),
            refresh_type: TokenPurpose::Refresh.as_str().to_string(),
        }
    }
}

impl JwtSettings {
    /// Reject settings the server must not start with.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::configuration("token issuer must not be empty"));
        }
        if self.audience.trim().is_empty() {
            return Err(AuthError::configuration("token audience must not be empty"));
        }
        if self.access_ttl <= TimeDelta::zero() || self.refresh_ttl <= TimeDelta::zero() {
            return Err(AuthError::configuration(
                "token lifetimes must be greater than zero",
            ));
        }
        if self.access_type.is_empty() || self.refresh_type.is_empty() {
            return Err(AuthError::configuration("token type tags must not be empty"));
        }
        if self.access_type == self.refresh_type {
            return Err(AuthError::configuration(
                "access and refresh token type tags must differ",
            ));
        }
        Ok(())
    }

    pub fn lifetime(&self, purpose: TokenPurpose) -> TimeDelta {
        match purpose {
            TokenPurpose::Access => self.access_ttl,
            TokenPurpose::Refresh => self.refresh_ttl,
        }
    }

    pub fn type_tag(&self, purpose: TokenPurpose) -> &str {
        match purpose {
            TokenPurpose::Access => &self.access_type,
            TokenPurpose::Refresh => &self.refresh_type,
        }
    }

    /// Map a `tokenType` claim back to its purpose. Unknown tags yield `None`.
    pub fn purpose_of(&self, tag: &str) -> Option<TokenPurpose> {
        if tag == self.access_type {
            Some(TokenPurpose::Access)
        } else if tag == self.refresh_type {
            Some(TokenPurpose::Refresh)
        } else {
            None
        }
    }
}

/// A permission claim attached to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Identity and authorization claims of a token subject. Built fresh for
/// every issuance and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Username
    pub name: String,
    pub email: String,
    /// JWT ID, unique per token
    pub jti: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Purpose tag (see [`JwtSettings::type_tag`])
    #[serde(rename = "tokenType")]
    pub token_type: String,
}

impl ClaimSet {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Full payload of a signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(flatten)]
    pub claims: ClaimSet,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signing key plus the settings every token is checked against.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    settings: JwtSettings,
}

impl JwtConfig {
    /// Create a JWT configuration with the given symmetric secret.
    pub fn new(secret: &[u8], settings: JwtSettings) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::configuration("signing key must not be empty"));
        }
        settings.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            settings,
        })
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    /// Sign a claim set with the configured issuer and audience.
    pub fn sign(&self, claims: &ClaimSet, expires_at: DateTime<Utc>) -> Result<String, JwtError> {
        let payload = TokenClaims {
            claims: claims.clone(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verify signature, issuer, audience and expiry.
    ///
    /// Every failure yields `None` so callers cannot tell which check failed.
    pub fn validate(&self, token: &str) -> Option<TokenClaims> {
        match jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(error = %e, "Token failed validation");
                None
            }
        }
    }

    /// Purpose of validated claims, if the tag is one we issue.
    pub fn purpose_of(&self, claims: &TokenClaims) -> Option<TokenPurpose> {
        self.settings.purpose_of(&claims.claims.token_type)
    }
}

/// Errors that can occur while producing a token.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
}
