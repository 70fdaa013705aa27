//! Admin API endpoints.
//!
//! All endpoints require the admin role.

use axum::{
    Json, Router, extract::State, http::StatusCode, middleware, response::IntoResponse,
    routing::patch,
};
use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use crate::auth::{AdminOnly, Auth, RevocationManager, require_access_token};
use crate::db::Database;
use crate::directory::UserDirectory;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/lockUser", patch(lock_user))
        .route("/unlockUser", patch(unlock_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token::<AdminState>,
        ))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockUserRequest {
    username: String,
    lockout_in_days: i64,
}

/// Lock an account for a number of days and revoke all of its tokens.
///
/// Tokens are revoked before the lockout is stored. If revocation fails
/// nothing changes and the call can be retried; if storing the lockout fails
/// the tokens stay revoked but the account can still log in.
async fn lock_user(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    Json(payload): Json<LockUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.lockout_in_days <= 0 {
        return Err(ApiError::bad_request("Lockout must be at least one day"));
    }
    let lockout_end = TimeDelta::try_days(payload.lockout_in_days)
        .and_then(|days| Utc::now().checked_add_signed(days))
        .ok_or_else(|| ApiError::bad_request("Lockout is too long"))?;

    let revoked = RevocationManager::new(state.db.tokens())
        .revoke_all(&payload.username)
        .await?;

    let updated = state
        .db
        .users()
        .set_lockout(&payload.username, Some(lockout_end))
        .await
        .map_err(|e| {
            warn!(username = %payload.username, error = %e, "Failed to set lockout");
            ApiError::bad_request("Failed to lock user")
        })?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(
        admin = %auth.username(),
        username = %payload.username,
        until = %lockout_end,
        revoked,
        "User locked"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct UnlockUserRequest {
    username: String,
}

async fn unlock_user(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    Json(payload): Json<UnlockUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .db
        .users()
        .set_lockout(&payload.username, None)
        .await
        .map_err(|e| {
            warn!(username = %payload.username, error = %e, "Failed to clear lockout");
            ApiError::bad_request("Failed to unlock user")
        })?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(admin = %auth.username(), username = %payload.username, "User unlocked");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_request_uses_camel_case() {
        let request: LockUserRequest =
            serde_json::from_str(r#"{"username":"bob","lockoutInDays":3}"#).unwrap();
        assert_eq!(request.username, "bob");
        assert_eq!(request.lockout_in_days, 3);
    }
}
