/// Permission guard extractor
///
/// [`Permitted`] resolves before any body extractor runs, so an anonymous,
/// inactive or unprivileged caller is turned away before the request body
/// is read.
///
/// ```no_run
/// use greenlight_api::routes::guard::{MoviesRead, Permitted};
///
/// async fn handler(Permitted { user, .. }: Permitted<MoviesRead>) -> String {
///     format!("hello, {}", user.name)
/// }
/// ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use greenlight_shared::auth::{authorization::require_permission, middleware::AuthContext};
use greenlight_shared::models::permission::{MOVIES_READ, MOVIES_WRITE};
use greenlight_shared::models::user::User;
use std::marker::PhantomData;

use crate::{app::AppState, error::ApiError};

/// A permission code known at compile time
pub trait Permission: Send + Sync + 'static {
    const CODE: &'static str;
}

/// `movies:read`
#[derive(Debug)]
pub struct MoviesRead;

impl Permission for MoviesRead {
    const CODE: &'static str = MOVIES_READ;
}

/// `movies:write`
#[derive(Debug)]
pub struct MoviesWrite;

impl Permission for MoviesWrite {
    const CODE: &'static str = MOVIES_WRITE;
}

/// An activated user holding permission `P`
#[derive(Debug)]
pub struct Permitted<P> {
    pub user: User,
    _permission: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P: Permission> FromRequestParts<AppState> for Permitted<P> {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default();

        let user = auth.require_activated_user()?;
        require_permission(&state.db, user, P::CODE).await?;

        Ok(Self {
            user: user.clone(),
            _permission: PhantomData,
        })
    }
}
