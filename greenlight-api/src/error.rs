/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`. Lower layers keep their own
/// error enums and convert into [`ApiError`] through `From`, so `?` does the
/// mapping to status codes.
///
/// Error bodies use the same envelope as successful responses:
///
/// ```json
/// {"error": "the requested resource could not be found"}
/// {"error": {"title": "must be provided", "year": "must not be in the future"}}
/// ```
///
/// Internal failures are logged with full detail and reach the client only as
/// a generic message.
///
/// # Example
///
/// ```no_run
/// use greenlight_api::error::{ApiError, ApiResult};
/// use greenlight_shared::models::movie::Movie;
/// use sqlx::PgPool;
///
/// async fn show(pool: &PgPool, id: i64) -> ApiResult<Movie> {
///     // ModelError::NotFound becomes a 404
///     Ok(Movie::get(pool, id).await?)
/// }
/// ```

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use greenlight_shared::auth::{
    authorization::AuthzError, middleware::AuthError, password::PasswordError,
};
use greenlight_shared::models::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::codec::{self, DecodeError};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
pub const EDIT_CONFLICT_MESSAGE: &str =
    "unable to update the record due to an edit conflict, please try again";
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid authentication credentials";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400), e.g. an undecodable body
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Method not allowed (405)
    MethodNotAllowed(String),

    /// Conflict (409), a stale version
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::NotFound(NOT_FOUND_MESSAGE.to_string())
    }

    pub fn edit_conflict() -> Self {
        ApiError::Conflict(EDIT_CONFLICT_MESSAGE.to_string())
    }

    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string())
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: &str) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::MethodNotAllowed(msg) => write!(f, "Method not allowed: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let payload = match self {
            ApiError::ValidationError(errors) => {
                // First message wins for each field
                let mut fields = Map::new();
                for detail in errors {
                    fields
                        .entry(detail.field)
                        .or_insert(Value::String(detail.message));
                }
                Value::Object(fields)
            }
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "internal error");
                Value::String(SERVER_ERROR_MESSAGE.to_string())
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::Conflict(msg) => Value::String(msg),
        };

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        codec::encode(status, "error", &payload, headers)
    }
}

/// Convert model errors to API errors
impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound => ApiError::not_found(),
            ModelError::EditConflict => ApiError::edit_conflict(),
            ModelError::DuplicateEmail => {
                ApiError::invalid_field("email", "a user with this email address already exists")
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    ValidationErrorDetail::new(
                        field.to_string(),
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "is invalid".to_string()),
                    )
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

/// Convert body decoding errors to API errors
impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::AuthenticationRequired => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::InactiveAccount => ApiError::Forbidden(err.to_string()),
            AuthError::DatabaseError(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotPermitted => ApiError::Forbidden(err.to_string()),
            AuthzError::Database(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// A blocking task that panicked or was cancelled
impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::InternalError(format!("blocking task failed: {}", err))
    }
}
