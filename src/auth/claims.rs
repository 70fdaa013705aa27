//! Claim set assembly for token issuance.

use crate::directory::UserDirectory;
use crate::error::AuthError;
use crate::jwt::ClaimSet;

/// Build the claims for `username`, tagged with `token_type`.
///
/// Role claims reflect the directory at the time of the call. Permission
/// claims of every role are appended as-is; duplicates across roles are kept.
pub async fn build_claims<D: UserDirectory>(
    directory: &D,
    username: &str,
    token_type: &str,
) -> Result<ClaimSet, AuthError> {
    let identity = directory
        .find_by_name(username)
        .await?
        .ok_or(AuthError::NotFound)?;

    let roles = directory.roles_of(&identity.username).await?;

    let mut permissions = Vec::new();
    for role in &roles {
        permissions.extend(directory.permissions_of(role).await?);
    }

    Ok(ClaimSet {
        name: identity.username,
        email: identity.email,
        jti: uuid::Uuid::new_v4().to_string(),
        roles,
        permissions,
        token_type: token_type.to_string(),
    })
}
