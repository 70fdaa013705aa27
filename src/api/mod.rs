mod admin;
mod error;
mod user;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;

pub use admin::AdminState;
pub use error::{ApiError, ResultExt};
pub use user::UserState;

/// Create the API router.
///
/// Public and protected routes live side by side; only the protected ones
/// are wrapped by the access token gate.
pub fn create_api_router(db: Database, jwt: Arc<JwtConfig>) -> Router {
    let admin_state = admin::AdminState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let user_state = user::UserState { db, jwt };

    Router::new()
        .nest("/user", user::router(user_state))
        .nest("/admin", admin::router(admin_state))
}
