/// Scoped, expiring bearer tokens
///
/// A token is bound to one user and one scope. Activation tokens are mailed
/// out at registration; authentication tokens are handed out by the login
/// endpoint. Only the SHA-256 digest is stored, and a token is only honoured
/// for the scope it was issued under.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tokens (
///     hash text PRIMARY KEY,
///     user_id bigint NOT NULL REFERENCES users ON DELETE CASCADE,
///     expiry timestamp(0) with time zone NOT NULL,
///     scope text NOT NULL
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;

use super::{with_deadline, ModelError};
use crate::auth::token::generate_token;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    /// Single-purpose token that activates an account
    Activation,

    /// Bearer credential for API requests
    Authentication,
}

impl TokenScope {
    /// Value stored in `tokens.scope`
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly issued token
///
/// The plaintext exists only in this value and is never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    /// Plaintext handed to the client
    pub token: String,

    /// Hex SHA-256 digest of the plaintext
    #[serde(skip)]
    pub hash: String,

    #[serde(skip)]
    pub user_id: i64,

    pub expiry: DateTime<Utc>,

    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Builds a token without touching the database
    pub fn new(user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let (token, hash) = generate_token();

        // Stored with second precision; truncate so the caller sees the same expiry
        let expiry = DateTime::from_timestamp((Utc::now() + ttl).timestamp(), 0)
            .unwrap_or_else(|| Utc::now() + ttl);

        Self {
            token,
            hash,
            user_id,
            expiry,
            scope,
        }
    }

    /// Generates and stores a new token for a user
    ///
    /// # Errors
    ///
    /// Database failures, including a missing user (foreign key violation)
    pub async fn issue(
        pool: &PgPool,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Self, ModelError> {
        let token = Token::new(user_id, ttl, scope);

        with_deadline(
            sqlx::query(
                r#"
                INSERT INTO tokens (hash, user_id, expiry, scope)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expiry)
            .bind(token.scope.as_str())
            .execute(pool),
        )
        .await?;

        tracing::debug!(user_id, scope = %scope, "issued token");

        Ok(token)
    }

    /// Deletes every token of `scope` belonging to a user
    ///
    /// Returns the number of tokens removed. Tokens of other scopes survive.
    pub async fn delete_all_for_user(
        pool: &PgPool,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<u64, ModelError> {
        let result = with_deadline(
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}
