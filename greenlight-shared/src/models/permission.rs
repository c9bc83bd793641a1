/// Permission codes granted to users
///
/// A permission is a capability code such as `movies:read`. Users hold any
/// number of them through the `users_permissions` join table.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE permissions (
///     id bigserial PRIMARY KEY,
///     code text NOT NULL UNIQUE
/// );
///
/// CREATE TABLE users_permissions (
///     user_id bigint NOT NULL REFERENCES users ON DELETE CASCADE,
///     permission_id bigint NOT NULL REFERENCES permissions ON DELETE CASCADE,
///     PRIMARY KEY (user_id, permission_id)
/// );
/// ```

use sqlx::PgPool;

use super::{with_deadline, ModelError};

/// Read access to movies
pub const MOVIES_READ: &str = "movies:read";

/// Write access to movies
pub const MOVIES_WRITE: &str = "movies:write";

/// The set of permission codes held by one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    /// Whether `code` is among the held permissions
    pub fn includes(&self, code: &str) -> bool {
        self.0.iter().any(|held| held == code)
    }

    /// Loads every permission code held by a user
    pub async fn for_user(pool: &PgPool, user_id: i64) -> Result<Self, ModelError> {
        let codes = with_deadline(
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT permissions.code
                FROM permissions
                INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                WHERE users_permissions.user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_all(pool),
        )
        .await?;

        Ok(Permissions(codes))
    }

    /// Grants the given codes to a user
    ///
    /// Unknown codes are ignored; codes the user already holds are left alone.
    pub async fn grant(pool: &PgPool, user_id: i64, codes: &[&str]) -> Result<(), ModelError> {
        let codes: Vec<String> = codes.iter().map(|code| code.to_string()).collect();

        with_deadline(
            sqlx::query(
                r#"
                INSERT INTO users_permissions (user_id, permission_id)
                SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(codes)
            .execute(pool),
        )
        .await?;

        Ok(())
    }
}
