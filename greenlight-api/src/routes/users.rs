/// User registration and activation
///
/// # Endpoints
///
/// ```text
/// POST /v1/users            register, 202 Accepted
/// PUT  /v1/users/activated  consume an activation token
/// ```
///
/// Registration responds before the welcome email is sent: delivery runs as a
/// background task and is drained on shutdown.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use chrono::Duration;
use greenlight_shared::auth::{password::hash_password, token::validate_token_format};
use greenlight_shared::models::permission::{Permissions, MOVIES_READ};
use greenlight_shared::models::token::{Token, TokenScope};
use greenlight_shared::models::user::{
    validate_email, validate_name, validate_password, CreateUser, User,
};
use greenlight_shared::models::ModelError;
use serde::Deserialize;
use validator::ValidationErrors;

use crate::{
    app::AppState,
    codec::{self, StrictJson},
    error::{ApiError, ApiResult},
    mailer::{send_with_retry, Template},
};

/// Lifetime of an activation token
pub const ACTIVATION_TTL_DAYS: i64 = 3;

/// Body of `POST /v1/users`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of `PUT /v1/users/activated`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateUserRequest {
    pub token: String,
}

/// Register handler
///
/// Creates an inactive user holding `movies:read`, issues an activation
/// token and queues the welcome email carrying it.
///
/// # Errors
///
/// - 400 for an undecodable body
/// - 422 for invalid fields or an email that is already registered
pub async fn register_user(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<RegisterUserRequest>,
) -> ApiResult<Response> {
    let mut errors = ValidationErrors::new();
    validate_name(&input.name, &mut errors);
    validate_email(&input.email, &mut errors);
    validate_password(&input.password, &mut errors);
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let password = input.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = User::create(
        &state.db,
        CreateUser {
            name: input.name,
            email: input.email,
            password_hash,
        },
    )
    .await?;

    Permissions::grant(&state.db, user.id, &[MOVIES_READ]).await?;

    let token = Token::issue(
        &state.db,
        user.id,
        Duration::days(ACTIVATION_TTL_DAYS),
        TokenScope::Activation,
    )
    .await?;

    tracing::info!(user_id = user.id, "user registered");

    let mailer = state.mailer.clone();
    let recipient = user.email.clone();
    let template = Template::UserWelcome {
        user_id: user.id,
        activation_token: token.token,
    };
    state.background.spawn("welcome email", async move {
        send_with_retry(mailer.as_ref(), &recipient, &template).await
    });

    Ok(codec::encode(StatusCode::ACCEPTED, "user", &user, HeaderMap::new()))
}

/// Activate handler
///
/// Marks the token's owner as activated and deletes all of their
/// activation tokens, so each token works once.
///
/// # Errors
///
/// - 422 if the token is malformed, unknown or expired
/// - 409 if the user record changed concurrently
pub async fn activate_user(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<ActivateUserRequest>,
) -> ApiResult<Response> {
    if input.token.is_empty() {
        return Err(ApiError::invalid_field("token", "must be provided"));
    }
    if !validate_token_format(&input.token) {
        return Err(ApiError::invalid_field("token", "must be 26 bytes long"));
    }

    let mut user = match User::find_for_token(&state.db, TokenScope::Activation, &input.token).await {
        Ok(user) => user,
        Err(ModelError::NotFound) => {
            return Err(ApiError::invalid_field(
                "token",
                "invalid or expired activation token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    User::update(&state.db, &mut user).await?;

    Token::delete_all_for_user(&state.db, TokenScope::Activation, user.id).await?;
    tracing::info!(user_id = user.id, "user activated");

    Ok(codec::encode(StatusCode::OK, "user", &user, HeaderMap::new()))
}
