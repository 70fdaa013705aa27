//! Per-request gate for protected routes.
//!
//! A request passes the gates in order and is rejected by the first one that
//! fails. Routes without an authorization requirement are simply not wrapped
//! by [`require_access_token`].

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use super::bearer::bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::revocation::RevocationManager;
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::Database;
use crate::jwt::{JwtConfig, TokenClaims, TokenPurpose};

/// A single check applied to an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// An `Authorization: Bearer` header is present and well formed.
    Bearer,
    /// The credential store knows the token and it is not revoked.
    Usable,
    /// Signature, issuer, audience and expiry are valid.
    Signature,
    /// The token was issued as an access token.
    Purpose,
}

/// Gates applied to every route that requires an access token.
pub const ACCESS_GATES: &[Gate] = &[Gate::Bearer, Gate::Usable, Gate::Signature, Gate::Purpose];

struct GateContext<'a> {
    headers: &'a HeaderMap,
    jwt: &'a JwtConfig,
    db: &'a Database,
    token: Option<&'a str>,
    claims: Option<TokenClaims>,
}

impl<'a> GateContext<'a> {
    fn token(&mut self) -> Result<&'a str, AuthErrorKind> {
        if self.token.is_none() {
            self.token = bearer_token(self.headers);
        }
        self.token.ok_or(AuthErrorKind::MissingToken)
    }

    fn claims(&mut self) -> Result<&TokenClaims, AuthErrorKind> {
        if self.claims.is_none() {
            let token = self.token()?;
            self.claims = self.jwt.validate(token);
        }
        self.claims.as_ref().ok_or(AuthErrorKind::InvalidToken)
    }
}

impl Gate {
    async fn check(self, ctx: &mut GateContext<'_>) -> Result<(), AuthErrorKind> {
        match self {
            Gate::Bearer => ctx.token().map(|_| ()),
            Gate::Usable => {
                let token = ctx.token()?;
                let usable = RevocationManager::new(ctx.db.tokens())
                    .is_usable(token)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "Failed to check token status");
                        AuthErrorKind::StoreFailure
                    })?;
                if usable {
                    Ok(())
                } else {
                    Err(AuthErrorKind::TokenRevoked)
                }
            }
            Gate::Signature => ctx.claims().map(|_| ()),
            Gate::Purpose => {
                let jwt = ctx.jwt;
                let claims = ctx.claims()?;
                match jwt.purpose_of(claims) {
                    Some(TokenPurpose::Access) => Ok(()),
                    _ => Err(AuthErrorKind::WrongPurpose),
                }
            }
        }
    }
}

/// Run `gates` in order against the request headers.
///
/// Claims are always verified before a user is returned, even if `gates`
/// does not list [`Gate::Signature`].
pub async fn authenticate(
    headers: &HeaderMap,
    jwt: &JwtConfig,
    db: &Database,
    gates: &[Gate],
) -> Result<AuthenticatedUser, AuthErrorKind> {
    let mut ctx = GateContext {
        headers,
        jwt,
        db,
        token: None,
        claims: None,
    };

    for gate in gates {
        if let Err(kind) = gate.check(&mut ctx).await {
            debug!(gate = ?gate, reason = ?kind, "Request rejected");
            return Err(kind);
        }
    }

    ctx.claims()?;
    let token = ctx.token()?.to_string();
    let claims = ctx.claims.ok_or(AuthErrorKind::InvalidToken)?;
    Ok(AuthenticatedUser { claims, token })
}

/// Middleware for routes that require a valid, unrevoked access token.
///
/// On success the caller is available to handlers as an [`AuthenticatedUser`]
/// request extension (see [`super::Auth`]).
pub async fn require_access_token<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiAuthError>
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let user = authenticate(request.headers(), state.jwt(), state.db(), ACCESS_GATES).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
