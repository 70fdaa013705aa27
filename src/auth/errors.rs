//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Internal auth error kind used by the gate and the extractors.
///
/// The kind only drives logging and the status code. Every 401 carries the
/// same body so a client cannot learn which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingToken,
    InvalidToken,
    TokenRevoked,
    WrongPurpose,
    InsufficientRole,
    StoreFailure,
}

/// API authentication errors (returns JSON).
#[derive(Debug)]
pub struct ApiAuthError {
    kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::MissingToken
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::TokenRevoked
            | AuthErrorKind::WrongPurpose => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::MissingToken
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::TokenRevoked
            | AuthErrorKind::WrongPurpose => "Unauthorized",
            AuthErrorKind::InsufficientRole => "Forbidden",
            AuthErrorKind::StoreFailure => "Internal server error",
        }
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_kinds_share_status_and_body() {
        for kind in [
            AuthErrorKind::MissingToken,
            AuthErrorKind::InvalidToken,
            AuthErrorKind::TokenRevoked,
            AuthErrorKind::WrongPurpose,
        ] {
            let error = ApiAuthError::new(kind);
            assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
            assert_eq!(error.message(), "Unauthorized");
        }
    }

    #[test]
    fn test_role_and_store_failures() {
        let forbidden = ApiAuthError::new(AuthErrorKind::InsufficientRole).into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let internal = ApiAuthError::new(AuthErrorKind::StoreFailure).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
