/// Database models for Greenlight
///
/// This module contains the persisted records and their operations.
///
/// # Models
///
/// - `movie`: Movie records under optimistic concurrency control
/// - `runtime`: The `"<n> mins"` runtime field
/// - `filters`: Pagination, sort allow-list and list metadata
/// - `user`: User accounts, also version-fenced
/// - `token`: Scoped bearer tokens (activation, authentication)
/// - `permission`: Capability codes granted to users
///
/// # Errors and deadlines
///
/// Every operation returns [`ModelError`] and is bounded by [`QUERY_TIMEOUT`].
/// A stalled database surfaces as [`ModelError::Timeout`] and is never retried
/// here; retry policy belongs to the caller.
///
/// # Example
///
/// ```no_run
/// use greenlight_shared::models::movie::{CreateMovie, Movie};
/// use greenlight_shared::models::runtime::Runtime;
/// use greenlight_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let movie = Movie::create(&pool, CreateMovie {
///     title: "The Breakfast Club".to_string(),
///     year: 1986,
///     runtime: Runtime(96),
///     genres: vec!["drama".to_string()],
/// }).await?;
/// assert_eq!(movie.version, 1);
/// # Ok(())
/// # }
/// ```

use std::future::Future;
use std::time::Duration;

pub mod filters;
pub mod movie;
pub mod permission;
pub mod runtime;
pub mod token;
pub mod user;

/// Deadline applied to every database call made by the models
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Error type for model operations
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// No record matched, or the identifier was not a valid one
    #[error("record not found")]
    NotFound,

    /// The stored version moved on since the caller read the record
    #[error("edit conflict")]
    EditConflict,

    /// Unique constraint on `users.email`
    #[error("duplicate email")]
    DuplicateEmail,

    /// Sort key outside the allow-list reached the query builder
    #[error("unsafe sort parameter: {0}")]
    UnsafeSort(String),

    /// The per-call deadline expired
    #[error("database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Runs a database future under [`QUERY_TIMEOUT`]
pub(crate) async fn with_deadline<T, F>(fut: F) -> Result<T, ModelError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result.map_err(ModelError::from),
        Err(_) => Err(ModelError::Timeout(QUERY_TIMEOUT)),
    }
}

/// Builds a validation error carrying a client-facing message
pub(crate) fn field_error(code: &'static str, message: &'static str) -> validator::ValidationError {
    let mut err = validator::ValidationError::new(code);
    err.message = Some(std::borrow::Cow::Borrowed(message));
    err
}

/// Whether a database error is a violation of the named unique constraint
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}
