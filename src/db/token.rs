//! Issued token storage for revocation tracking.
//!
//! Every access and refresh token gets a row at issuance. Rows are only
//! mutated by revocation and only deleted by the cleanup sweep.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// A stored token record.
#[derive(Debug, Clone)]
pub struct IssuedTokenRecord {
    pub id: String,
    pub owner_name: String,
    pub value: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub is_revoked: bool,
}

#[derive(sqlx::FromRow)]
struct IssuedTokenRow {
    id: String,
    owner_name: String,
    value: String,
    token_type: String,
    expires_at: i64,
    revoked_at: Option<i64>,
    is_revoked: i32,
}

impl From<IssuedTokenRow> for IssuedTokenRecord {
    fn from(row: IssuedTokenRow) -> Self {
        Self {
            id: row.id,
            owner_name: row.owner_name,
            value: row.value,
            token_type: row.token_type,
            expires_at: DateTime::from_timestamp(row.expires_at, 0).unwrap_or_default(),
            revoked_at: row.revoked_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            is_revoked: row.is_revoked != 0,
        }
    }
}

/// Data needed to record a freshly signed token.
#[derive(Debug, Clone, Copy)]
pub struct NewIssuedToken<'a> {
    pub owner_name: &'a str,
    pub value: &'a str,
    pub token_type: &'a str,
    pub expires_at: DateTime<Utc>,
}

/// Store for issued tokens.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new, unrevoked token. Returns the generated row ID.
    /// A duplicate token value is reported as an error.
    pub async fn insert(&self, token: NewIssuedToken<'_>) -> Result<String, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO issued_tokens (id, owner_name, value, token_type, expires_at, is_revoked) VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(token.owner_name)
        .bind(token.value)
        .bind(token.token_type)
        .bind(token.expires_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Look up a token record by its serialized value.
    pub async fn get_by_value(&self, value: &str) -> Result<Option<IssuedTokenRecord>, sqlx::Error> {
        let row: Option<IssuedTokenRow> = sqlx::query_as(
            "SELECT id, owner_name, value, token_type, expires_at, revoked_at, is_revoked FROM issued_tokens WHERE value = ?",
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(IssuedTokenRecord::from))
    }

    /// List every token recorded for an owner, newest first.
    pub async fn list_by_owner(&self, owner_name: &str) -> Result<Vec<IssuedTokenRecord>, sqlx::Error> {
        let rows: Vec<IssuedTokenRow> = sqlx::query_as(
            "SELECT id, owner_name, value, token_type, expires_at, revoked_at, is_revoked FROM issued_tokens WHERE owner_name = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(owner_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(IssuedTokenRecord::from).collect())
    }

    /// Revoke every token of an owner that is not revoked yet.
    /// Already revoked rows keep their original `revoked_at`.
    pub async fn revoke_all_by_owner(
        &self,
        owner_name: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE issued_tokens SET is_revoked = 1, revoked_at = ? WHERE owner_name = ? AND is_revoked = 0",
        )
        .bind(now.timestamp())
        .bind(owner_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete all tokens that are expired or revoked.
    pub async fn delete_expired_or_revoked(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM issued_tokens WHERE expires_at < ? OR is_revoked = 1")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeDelta;

    fn new_token<'a>(owner: &'a str, value: &'a str, expires_at: DateTime<Utc>) -> NewIssuedToken<'a> {
        NewIssuedToken {
            owner_name: owner,
            value,
            token_type: "access",
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::open(":memory:").await.unwrap();
        let expires = Utc::now() + TimeDelta::minutes(5);

        let id = db
            .tokens()
            .insert(new_token("alice", "token-a", expires))
            .await
            .unwrap();

        let record = db.tokens().get_by_value("token-a").await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.owner_name, "alice");
        assert_eq!(record.expires_at.timestamp(), expires.timestamp());
        assert!(!record.is_revoked);
        assert!(record.revoked_at.is_none());

        assert!(db.tokens().get_by_value("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_value_is_an_error() {
        let db = Database::open(":memory:").await.unwrap();
        let expires = Utc::now() + TimeDelta::minutes(5);

        db.tokens()
            .insert(new_token("alice", "same", expires))
            .await
            .unwrap();
        let result = db.tokens().insert(new_token("bob", "same", expires)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_revoke_all_only_touches_owner() {
        let db = Database::open(":memory:").await.unwrap();
        let expires = Utc::now() + TimeDelta::minutes(5);
        let tokens = db.tokens();

        tokens.insert(new_token("alice", "a1", expires)).await.unwrap();
        tokens.insert(new_token("alice", "a2", expires)).await.unwrap();
        tokens.insert(new_token("bob", "b1", expires)).await.unwrap();

        let first = Utc::now();
        assert_eq!(tokens.revoke_all_by_owner("ALICE", first).await.unwrap(), 2);
        assert_eq!(
            tokens
                .revoke_all_by_owner("alice", first + TimeDelta::hours(1))
                .await
                .unwrap(),
            0
        );

        for record in tokens.list_by_owner("alice").await.unwrap() {
            assert!(record.is_revoked);
            assert_eq!(record.revoked_at.unwrap().timestamp(), first.timestamp());
        }
        assert!(!tokens.get_by_value("b1").await.unwrap().unwrap().is_revoked);
    }

    #[tokio::test]
    async fn test_delete_expired_or_revoked() {
        let db = Database::open(":memory:").await.unwrap();
        let now = Utc::now();
        let tokens = db.tokens();

        tokens
            .insert(new_token("alice", "expired", now - TimeDelta::minutes(1)))
            .await
            .unwrap();
        tokens
            .insert(new_token("bob", "revoked", now + TimeDelta::minutes(5)))
            .await
            .unwrap();
        tokens
            .insert(new_token("carol", "live", now + TimeDelta::minutes(5)))
            .await
            .unwrap();
        tokens.revoke_all_by_owner("bob", now).await.unwrap();

        assert_eq!(tokens.delete_expired_or_revoked(now).await.unwrap(), 2);
        assert!(tokens.get_by_value("expired").await.unwrap().is_none());
        assert!(tokens.get_by_value("revoked").await.unwrap().is_none());
        assert!(tokens.get_by_value("live").await.unwrap().is_some());
    }
}
