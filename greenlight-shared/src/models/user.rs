/// User model and database operations
///
/// Users register with a name, email and password, start out inactive, and
/// are activated by presenting an activation token. Like movies, user rows
/// carry a `version` and every update is fenced on it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id bigserial PRIMARY KEY,
///     created_at timestamp(0) with time zone NOT NULL DEFAULT NOW(),
///     name text NOT NULL,
///     email citext UNIQUE NOT NULL,
///     password_hash text NOT NULL,
///     activated bool NOT NULL,
///     version integer NOT NULL DEFAULT 1
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use greenlight_shared::models::user::{CreateUser, User};
/// use greenlight_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     name: "Alice Smith".to_string(),
///     email: "alice@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
///
/// // Email lookup is case-insensitive
/// let found = User::find_by_email(&pool, "ALICE@example.com").await?;
/// assert_eq!(found.id, user.id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use validator::{ValidateEmail, ValidationErrors};

use super::token::TokenScope;
use super::{field_error, is_unique_violation, with_deadline, ModelError};
use crate::auth::token::hash_token;

/// Name of the unique constraint on `users.email`
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

const USER_COLUMNS: &str =
    "users.id, users.created_at, users.name, users.email::text AS email, users.password_hash, users.activated, users.version";

/// User account
///
/// The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    pub created_at: DateTime<Utc>,

    pub name: String,

    /// Email address, unique case-insensitively
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip)]
    pub password_hash: String,

    /// Whether the account has been activated
    pub activated: bool,

    pub version: i32,
}

/// Input for creating a new user
///
/// Takes the password hash, not the plaintext. New users are always
/// inactive.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Checks a display name
pub fn validate_name(name: &str, errors: &mut ValidationErrors) {
    if name.is_empty() {
        errors.add("name", field_error("required", "must be provided"));
    } else if name.len() > 500 {
        errors.add("name", field_error("length", "must not be more than 500 bytes long"));
    }
}

/// Checks an email address
pub fn validate_email(email: &str, errors: &mut ValidationErrors) {
    if email.is_empty() {
        errors.add("email", field_error("required", "must be provided"));
    } else if !email.to_owned().validate_email() {
        errors.add("email", field_error("email", "must be a valid email address"));
    }
}

/// Checks a plaintext password before it is hashed
pub fn validate_password(password: &str, errors: &mut ValidationErrors) {
    if let Err(message) = crate::auth::password::validate_password_plaintext(password) {
        errors.add("password", field_error("password", message));
    }
}

impl User {
    /// Inserts a new, inactive user
    ///
    /// # Errors
    ///
    /// `ModelError::DuplicateEmail` if the address is already registered
    /// (compared case-insensitively)
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, ModelError> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, false)
            RETURNING {USER_COLUMNS}
            "#
        );

        with_deadline(
            sqlx::query_as::<_, User>(&query)
                .bind(data.name)
                .bind(data.email)
                .bind(data.password_hash)
                .fetch_one(pool),
        )
        .await
        .map_err(map_duplicate_email)
    }

    /// Finds a user by email address, case-insensitively
    ///
    /// # Errors
    ///
    /// `ModelError::NotFound` if no user has that address
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Self, ModelError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1::citext");

        with_deadline(
            sqlx::query_as::<_, User>(&query)
                .bind(email)
                .fetch_optional(pool),
        )
        .await?
        .ok_or(ModelError::NotFound)
    }

    /// Writes the user back, fenced on `user.version`
    ///
    /// On success `user.version` holds the new stored version.
    ///
    /// # Errors
    ///
    /// - `ModelError::EditConflict` if the stored version moved on
    /// - `ModelError::DuplicateEmail` if the new address is taken
    pub async fn update(pool: &PgPool, user: &mut User) -> Result<(), ModelError> {
        let version = with_deadline(
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(pool),
        )
        .await
        .map_err(map_duplicate_email)?
        .ok_or(ModelError::EditConflict)?;

        user.version = version;
        Ok(())
    }

    /// Resolves a token plaintext to its owner
    ///
    /// Only tokens of the given scope that have not yet expired match. The
    /// plaintext is hashed before it reaches the database.
    ///
    /// # Errors
    ///
    /// `ModelError::NotFound` for an unknown, expired or wrong-scope token
    pub async fn find_for_token(
        pool: &PgPool,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<Self, ModelError> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
            AND tokens.scope = $2
            AND tokens.expiry > $3
            "#
        );

        with_deadline(
            sqlx::query_as::<_, User>(&query)
                .bind(hash_token(plaintext))
                .bind(scope.as_str())
                .bind(Utc::now())
                .fetch_optional(pool),
        )
        .await?
        .ok_or(ModelError::NotFound)
    }
}

fn map_duplicate_email(err: ModelError) -> ModelError {
    match err {
        ModelError::Database(ref db_err) if is_unique_violation(db_err, EMAIL_UNIQUE_CONSTRAINT) => {
            ModelError::DuplicateEmail
        }
        other => other,
    }
}
