//! Account endpoints: login, token refresh, logout and self-service.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, ManagerOrCustomer, RevocationManager, TokenIssuer, require_access_token};
use crate::db::{Database, ROLE_CUSTOMER};
use crate::directory::UserDirectory;
use crate::error::AuthError;
use crate::impl_has_auth_backend;
use crate::jwt::{JwtConfig, TokenPurpose};
use crate::password::{hash_password, validate_new_password};

#[derive(Clone)]
pub struct UserState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(UserState);

pub fn router(state: UserState) -> Router {
    let protected = Router::new()
        .route("/logout", delete(logout))
        .route("/me", get(me))
        .route("/changePassword", post(change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token::<UserState>,
        ));

    Router::new()
        .route("/login", post(login))
        .route("/refreshToken", post(refresh_token))
        .route("/signup", post(signup))
        .merge(protected)
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    refresh_token: String,
    refresh_token_expiration: DateTime<Utc>,
    access_token: String,
    access_token_expiration: DateTime<Utc>,
}

async fn login(
    State(state): State<UserState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users();

    let valid = users
        .check_password(&payload.username, &payload.password)
        .await
        .db_err("Failed to check password")?;
    if !valid {
        return Err(ApiError::not_found("Invalid username or password"));
    }

    let locked = users
        .is_locked_out(&payload.username)
        .await
        .db_err("Failed to check lockout")?;
    if locked {
        warn!(username = %payload.username, "Login attempt on locked account");
        return Err(AuthError::Authentication.into());
    }

    let pair = TokenIssuer::new(&state.jwt, &users, state.db.tokens())
        .issue_pair(&payload.username)
        .await?;

    info!(username = %payload.username, "User logged in");

    Ok(Json(LoginResponse {
        refresh_token: pair.refresh.token,
        refresh_token_expiration: pair.refresh.expires_at,
        access_token: pair.access.token,
        access_token_expiration: pair.access.expires_at,
    }))
}

#[derive(Deserialize)]
struct RefreshRequest {
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    access_token_expiration: DateTime<Utc>,
}

/// Exchange a refresh token for a new access token. The refresh token stays
/// valid until it expires or its owner's tokens are revoked.
async fn refresh_token(
    State(state): State<UserState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .jwt
        .validate(&payload.value)
        .ok_or(AuthError::Authentication)?;

    if state.jwt.purpose_of(&claims) != Some(TokenPurpose::Refresh) {
        return Err(AuthError::Authentication.into());
    }

    let usable = RevocationManager::new(state.db.tokens())
        .is_usable(&payload.value)
        .await?;
    if !usable {
        return Err(AuthError::Authentication.into());
    }

    let owner = claims.claims.name.as_str();
    let users = state.db.users();

    users
        .find_by_name(owner)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let locked = users
        .is_locked_out(owner)
        .await
        .db_err("Failed to check lockout")?;
    if locked {
        warn!(username = %owner, "Refresh attempt on locked account");
        return Err(AuthError::Authentication.into());
    }

    let access = TokenIssuer::new(&state.jwt, &users, state.db.tokens())
        .issue(owner, TokenPurpose::Access)
        .await?;

    Ok(Json(RefreshResponse {
        access_token: access.token,
        access_token_expiration: access.expires_at,
    }))
}

/// Revoke every token of the caller, including the one used for this call.
async fn logout(
    State(state): State<UserState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    RevocationManager::new(state.db.tokens())
        .revoke_all(auth.username())
        .await?;

    info!(username = %auth.username(), "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Serialize)]
struct SignupResponse {
    username: String,
    email: String,
}

async fn signup(
    State(state): State<UserState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();

    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }

    if username.len() > 32 {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }

    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    let email_valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if email.len() > 254 || !email_valid {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    validate_new_password(&payload.password).map_err(ApiError::bad_request)?;

    let users = state.db.users();
    let existing = users
        .get_by_username(username)
        .await
        .db_err("Failed to check username availability")?;
    if existing.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let hash = hash_password(&payload.password).db_err("Failed to hash password")?;
    users
        .create(username, email, &hash, ROLE_CUSTOMER)
        .await
        .map_err(|e| {
            // A concurrent sign-up took the name after the check above
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return ApiError::conflict("Username is already taken");
            }
            ApiError::db_error("Failed to create user", e)
        })?;

    info!(username = %username, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            username: username.to_string(),
            email: email.to_string(),
        }),
    ))
}

#[derive(Serialize)]
struct MeResponse {
    username: String,
    email: String,
    roles: Vec<String>,
}

async fn me(State(state): State<UserState>, auth: Auth) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users();
    let identity = users
        .find_by_name(auth.username())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let roles = users
        .roles_of(&identity.username)
        .await
        .db_err("Failed to get roles")?;

    Ok(Json(MeResponse {
        username: identity.username,
        email: identity.email,
        roles,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<UserState>,
    auth: Auth<ManagerOrCustomer>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_new_password(&payload.new_password).map_err(ApiError::bad_request)?;

    let users = state.db.users();
    let valid = users
        .check_password(auth.username(), &payload.old_password)
        .await
        .db_err("Failed to check password")?;
    if !valid {
        return Err(ApiError::conflict("Old password is incorrect"));
    }

    let hash = hash_password(&payload.new_password).db_err("Failed to hash password")?;
    let updated = users
        .set_password_hash(auth.username(), &hash)
        .await
        .db_err("Failed to update password")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(username = %auth.username(), "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
