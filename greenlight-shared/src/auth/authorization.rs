/// Permission checks for authenticated users
///
/// Runs after authentication and before any record is touched. A user either
/// holds a permission code or the request is refused with 403.
///
/// # Example
///
/// ```no_run
/// use greenlight_shared::auth::authorization::{require_permission, AuthzError};
/// use greenlight_shared::auth::middleware::AuthContext;
/// use greenlight_shared::models::permission::MOVIES_WRITE;
/// use sqlx::PgPool;
///
/// async fn check(pool: &PgPool, auth: &AuthContext) -> Result<(), Box<dyn std::error::Error>> {
///     let user = auth.require_activated_user()?;
///     require_permission(pool, user, MOVIES_WRITE).await?;
///     Ok(())
/// }
/// ```

use sqlx::PgPool;

use crate::models::permission::Permissions;
use crate::models::user::User;
use crate::models::ModelError;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The user lacks the permission code
    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    /// Permission lookup failed
    #[error("permission lookup failed: {0}")]
    Database(#[from] ModelError),
}

/// Checks that `user` holds the permission `code`
///
/// # Errors
///
/// - `AuthzError::NotPermitted` if the code is not granted to the user
/// - `AuthzError::Database` if the lookup failed
pub async fn require_permission(pool: &PgPool, user: &User, code: &str) -> Result<(), AuthzError> {
    let permissions = Permissions::for_user(pool, user.id).await?;
    check_permission(&permissions, user, code)
}

/// Pure half of [`require_permission`]
pub fn check_permission(permissions: &Permissions, user: &User, code: &str) -> Result<(), AuthzError> {
    if permissions.includes(code) {
        Ok(())
    } else {
        tracing::debug!(user_id = user.id, permission = code, "permission denied");
        Err(AuthzError::NotPermitted)
    }
}
