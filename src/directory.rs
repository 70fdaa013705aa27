//! The user directory capability.
//!
//! User accounts, role memberships and lockouts are owned by the directory.
//! The credential subsystem only reads identities and roles and asks the
//! directory to set or check a lockout. `db::UserStore` is the SQLite-backed
//! implementation; anything satisfying this trait can stand in for it.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::jwt::Permission;

pub type DirectoryError = sqlx::Error;

/// The parts of a user account the credential subsystem needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub email: String,
}

pub trait UserDirectory: Send + Sync {
    fn find_by_name(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<Identity>, DirectoryError>> + Send;

    /// Returns false for unknown users as well as wrong passwords.
    fn check_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool, DirectoryError>> + Send;

    fn roles_of(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Vec<String>, DirectoryError>> + Send;

    /// Permission claims attached to a role.
    fn permissions_of(
        &self,
        role: &str,
    ) -> impl Future<Output = Result<Vec<Permission>, DirectoryError>> + Send;

    /// Set (or clear with `None`) the lockout end. Returns false if the user does not exist.
    fn set_lockout(
        &self,
        username: &str,
        until: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<bool, DirectoryError>> + Send;

    fn is_locked_out(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<bool, DirectoryError>> + Send;
}
