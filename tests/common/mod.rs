#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use std::time::Duration;
use tokengate::{
    ServerConfig, create_app,
    db::Database,
    jwt::{JwtConfig, JwtSettings},
    password::hash_password,
};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    /// Same key and settings as the app, for inspecting or forging tokens.
    pub jwt: JwtConfig,
}

/// Create a test app backed by an in-memory database.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(JwtSettings::default()).await
}

pub async fn create_test_app_with(settings: JwtSettings) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        jwt_settings: settings.clone(),
        cleanup_interval: Duration::from_secs(3600),
    };
    let app = create_app(&config).expect("Failed to create app");
    let jwt = JwtConfig::new(TEST_SECRET, settings).expect("Invalid JWT config");
    TestApp { app, db, jwt }
}

impl TestApp {
    /// Create a user with `PASSWORD` holding a single role.
    pub async fn create_user(&self, username: &str, role: &str) {
        let hash = hash_password(PASSWORD).unwrap();
        self.db
            .users()
            .create(username, &format!("{}@example.com", username), &hash, role)
            .await
            .unwrap();
    }

    /// Send a request and return the status and the JSON body (Null if empty).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            // Extractor rejections are plain text
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn login_raw(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/api/user/login",
            None,
            Some(serde_json::json!({ "username": username, "password": password })),
        )
        .await
    }

    /// Log in with `PASSWORD` and return (access token, refresh token).
    pub async fn login(&self, username: &str) -> (String, String) {
        let (status, body) = self.login_raw(username, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    pub async fn refresh(&self, refresh_token: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/api/user/refreshToken",
            None,
            Some(serde_json::json!({ "value": refresh_token })),
        )
        .await
    }

    pub async fn me(&self, access_token: &str) -> StatusCode {
        self.send("GET", "/api/user/me", Some(access_token), None)
            .await
            .0
    }

    pub async fn logout(&self, access_token: &str) -> StatusCode {
        self.send("DELETE", "/api/user/logout", Some(access_token), None)
            .await
            .0
    }

    pub async fn lock(&self, admin_token: &str, username: &str, days: i64) -> (StatusCode, Value) {
        self.send(
            "PATCH",
            "/api/admin/lockUser",
            Some(admin_token),
            Some(serde_json::json!({ "username": username, "lockoutInDays": days })),
        )
        .await
    }

    pub async fn unlock(&self, admin_token: &str, username: &str) -> (StatusCode, Value) {
        self.send(
            "PATCH",
            "/api/admin/unlockUser",
            Some(admin_token),
            Some(serde_json::json!({ "username": username })),
        )
        .await
    }

    /// Whether the credential store still considers `token` usable.
    pub async fn is_usable(&self, token: &str) -> bool {
        tokengate::auth::RevocationManager::new(self.db.tokens())
            .is_usable(token)
            .await
            .unwrap()
    }
}

pub fn unauthorized_body() -> Value {
    serde_json::json!({ "error": "Unauthorized" })
}
