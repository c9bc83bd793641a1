/// Authentication token endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/tokens/authentication
/// ```
///
/// # Request
///
/// ```json
/// {"email": "alice@example.com", "password": "pa55word"}
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "authentication_token": {
///     "token": "IEYZQUBEMPPAKPOAWTPV6YJ6RM",
///     "expiry": "2024-01-02T12:00:00Z"
///   }
/// }
/// ```

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use chrono::Duration;
use greenlight_shared::auth::password::verify_password;
use greenlight_shared::models::token::{Token, TokenScope};
use greenlight_shared::models::user::{validate_email, validate_password, User};
use greenlight_shared::models::ModelError;
use serde::Deserialize;
use validator::ValidationErrors;

use crate::{
    app::AppState,
    codec::{self, StrictJson},
    error::{ApiError, ApiResult},
};

/// Lifetime of an authentication token
pub const AUTHENTICATION_TTL_HOURS: i64 = 24;

/// Body of `POST /v1/tokens/authentication`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateTokenRequest {
    pub email: String,
    pub password: String,
}

/// Login handler
///
/// An unknown email and a wrong password produce the same 401.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<CreateTokenRequest>,
) -> ApiResult<Response> {
    let mut errors = ValidationErrors::new();
    validate_email(&input.email, &mut errors);
    validate_password(&input.password, &mut errors);
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let user = match User::find_by_email(&state.db, &input.email).await {
        Ok(user) => user,
        Err(ModelError::NotFound) => return Err(ApiError::invalid_credentials()),
        Err(e) => return Err(e.into()),
    };

    let password = input.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
    if !matches {
        tracing::debug!(user_id = user.id, "password mismatch");
        return Err(ApiError::invalid_credentials());
    }

    let token = Token::issue(
        &state.db,
        user.id,
        Duration::hours(AUTHENTICATION_TTL_HOURS),
        TokenScope::Authentication,
    )
    .await?;

    Ok(codec::encode(
        StatusCode::CREATED,
        "authentication_token",
        &token,
        HeaderMap::new(),
    ))
}
