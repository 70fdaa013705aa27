//! Error taxonomy for the credential subsystem.
//!
//! Errors are carried as values through issuance, revocation and validation
//! and only turned into HTTP status codes at the API boundary.

use thiserror::Error;

use crate::jwt::JwtError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials, revoked token, wrong-purpose token or a token that
    /// failed verification. Never carries the reason.
    #[error("authentication failed")]
    Authentication,

    /// The referenced user does not exist.
    #[error("user not found")]
    NotFound,

    /// Persistence was unavailable while issuing or revoking.
    #[error("credential store error: {0}")]
    Store(#[from] sqlx::Error),

    /// The token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(#[from] JwtError),

    /// Missing or invalid startup configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl AuthError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
