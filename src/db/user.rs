use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::directory::{DirectoryError, Identity, UserDirectory};
use crate::jwt::Permission;
use crate::password::verify_password;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_CUSTOMER: &str = "customer";

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub lockout_end: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_end.is_some_and(|end| end > now)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    lockout_end: Option<i64>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            lockout_end: row
                .lockout_end
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user holding a single role. Returns the user ID.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
                .bind(username)
                .bind(email)
                .bind(password_hash)
                .execute(&mut *tx)
                .await?;
        let id = result.last_insert_rowid();

        let granted = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?",
        )
        .bind(id)
        .bind(role)
        .execute(&mut *tx)
        .await?;
        if granted.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash, lockout_end FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Grant an existing role. Returns false if the user or role is unknown
    /// or the membership already exists.
    pub async fn add_role(&self, username: &str, role: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id)
             SELECT u.id, r.id FROM users u, roles r WHERE u.username = ? AND r.name = ?",
        )
        .bind(username)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored password hash.
    pub async fn set_password_hash(&self, username: &str, hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE username = ?")
            .bind(hash)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl UserDirectory for UserStore {
    async fn find_by_name(&self, username: &str) -> Result<Option<Identity>, DirectoryError> {
        Ok(self.get_by_username(username).await?.map(|user| Identity {
            username: user.username,
            email: user.email,
        }))
    }

    async fn check_password(&self, username: &str, password: &str) -> Result<bool, DirectoryError> {
        Ok(self
            .get_by_username(username)
            .await?
            .is_some_and(|user| verify_password(password, &user.password_hash)))
    }

    async fn roles_of(&self, username: &str) -> Result<Vec<String>, DirectoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT r.name FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             JOIN users u ON u.id = ur.user_id
             WHERE u.username = ? ORDER BY r.id",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn permissions_of(&self, role: &str) -> Result<Vec<Permission>, DirectoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT rc.claim_type, rc.claim_value FROM role_claims rc
             JOIN roles r ON r.id = rc.role_id
             WHERE r.name = ? ORDER BY rc.id",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(kind, value)| Permission { kind, value })
            .collect())
    }

    async fn set_lockout(
        &self,
        username: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<bool, DirectoryError> {
        let result = sqlx::query("UPDATE users SET lockout_end = ? WHERE username = ?")
            .bind(until.map(|t| t.timestamp()))
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_locked_out(&self, username: &str) -> Result<bool, DirectoryError> {
        Ok(self
            .get_by_username(username)
            .await?
            .is_some_and(|user| user.is_locked_out(Utc::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::password::hash_password;
    use chrono::TimeDelta;

    async fn store_with_alice() -> UserStore {
        let db = Database::open(":memory:").await.unwrap();
        let hash = hash_password("alice-password").unwrap();
        db.users()
            .create("alice", "alice@example.com", &hash, ROLE_CUSTOMER)
            .await
            .unwrap();
        db.users()
    }

    #[tokio::test]
    async fn test_check_password() {
        let users = store_with_alice().await;
        assert!(users.check_password("alice", "alice-password").await.unwrap());
        assert!(!users.check_password("alice", "nope").await.unwrap());
        assert!(!users.check_password("bob", "alice-password").await.unwrap());
    }

    #[tokio::test]
    async fn test_roles_of() {
        let users = store_with_alice().await;
        assert_eq!(users.roles_of("alice").await.unwrap(), vec!["customer"]);

        assert!(users.add_role("alice", ROLE_MANAGER).await.unwrap());
        assert!(!users.add_role("alice", ROLE_MANAGER).await.unwrap());
        assert!(!users.add_role("alice", "wizard").await.unwrap());
        assert_eq!(
            users.roles_of("alice").await.unwrap(),
            vec!["manager", "customer"]
        );
        assert!(users.roles_of("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_unknown_role_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let result = db.users().create("carol", "c@example.com", "hash", "wizard").await;
        assert!(result.is_err());
        assert!(db.users().get_by_username("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lockout() {
        let users = store_with_alice().await;
        assert!(!users.is_locked_out("alice").await.unwrap());

        let until = Utc::now() + TimeDelta::days(1);
        assert!(users.set_lockout("alice", Some(until)).await.unwrap());
        assert!(users.is_locked_out("alice").await.unwrap());

        assert!(users.set_lockout("alice", None).await.unwrap());
        assert!(!users.is_locked_out("alice").await.unwrap());

        let past = Utc::now() - TimeDelta::days(1);
        users.set_lockout("alice", Some(past)).await.unwrap();
        assert!(!users.is_locked_out("alice").await.unwrap());

        assert!(!users.set_lockout("bob", Some(until)).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let users = store_with_alice().await;
        let identity = users.find_by_name("Alice").await.unwrap().unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.email, "alice@example.com");
        assert!(users.find_by_name("bob").await.unwrap().is_none());
    }
}
