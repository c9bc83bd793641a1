/// Bearer token authentication middleware for Axum
///
/// Every request passes through [`authenticate`]. It reads the
/// `Authorization` header, resolves the token to a user and stores an
/// [`AuthContext`] in the request extensions. A request without the header
/// continues as anonymous; handlers decide whether that is acceptable.
///
/// Every way a presented token can be wrong (bad header shape, bad token
/// shape, unknown, expired, wrong scope) produces the same 401 so callers
/// learn nothing about which check failed.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use greenlight_shared::auth::middleware::{create_auth_middleware, AuthContext};
/// use sqlx::PgPool;
///
/// async fn handler(auth: AuthContext) -> String {
///     match auth.user {
///         Some(user) => format!("Hello, {}!", user.name),
///         None => "Hello, stranger!".to_string(),
///     }
/// }
///
/// fn app(pool: PgPool) -> Router {
///     Router::new()
///         .route("/hello", get(handler))
///         .layer(middleware::from_fn(create_auth_middleware(pool)))
/// }
/// ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use super::token::validate_token_format;
use crate::json::envelope;
use crate::models::token::TokenScope;
use crate::models::user::User;
use crate::models::ModelError;

/// Who is making the request
///
/// Always present in the extensions of a request that went through
/// [`authenticate`]. Extracting it elsewhere yields an anonymous context.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// The authenticated user, or None for anonymous requests
    pub user: Option<User>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    /// The caller's user record
    ///
    /// # Errors
    ///
    /// `AuthError::AuthenticationRequired` for anonymous requests
    pub fn require_user(&self) -> Result<&User, AuthError> {
        self.user.as_ref().ok_or(AuthError::AuthenticationRequired)
    }

    /// The caller's user record, which must be activated
    ///
    /// # Errors
    ///
    /// - `AuthError::AuthenticationRequired` for anonymous requests
    /// - `AuthError::InactiveAccount` if the account is not yet activated
    pub fn require_activated_user(&self) -> Result<&User, AuthError> {
        let user = self.require_user()?;
        if !user.activated {
            return Err(AuthError::InactiveAccount);
        }
        Ok(user)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Error type for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The presented token is malformed, unknown, expired or out of scope
    #[error("invalid or missing authentication token")]
    InvalidToken,

    /// The route needs an authenticated user
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    /// The user exists but has not activated their account
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    /// Token lookup failed for infrastructure reasons
    #[error("database error: {0}")]
    DatabaseError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken | AuthError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AuthError::InactiveAccount => StatusCode::FORBIDDEN,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AuthError::DatabaseError(details) => {
                tracing::error!(error = %details, "token lookup failed");
                "the server encountered a problem and could not process your request".to_string()
            }
            other => other.to_string(),
        };

        let body = match envelope("error", &message) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize auth error");
                Vec::new()
            }
        };

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value
///
/// Returns None unless the value is exactly the scheme, one space and a
/// token of the issued shape.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if scheme != "Bearer" || !validate_token_format(token) {
        return None;
    }
    Some(token)
}

/// Resolves the `Authorization` header to an [`AuthContext`]
///
/// # Errors
///
/// - `AuthError::InvalidToken` for a malformed header or token, or one that
///   does not resolve to a user
/// - `AuthError::DatabaseError` if the lookup itself failed
pub async fn resolve_context(pool: &PgPool, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(AuthContext::anonymous());
    };

    let token = value
        .to_str()
        .ok()
        .and_then(parse_bearer)
        .ok_or(AuthError::InvalidToken)?;

    match User::find_for_token(pool, TokenScope::Authentication, token).await {
        Ok(user) => {
            tracing::debug!(user_id = user.id, "authenticated request");
            Ok(AuthContext::authenticated(user))
        }
        Err(ModelError::NotFound) => Err(AuthError::InvalidToken),
        Err(e) => Err(AuthError::DatabaseError(e.to_string())),
    }
}

/// Token authentication middleware
///
/// A request whose token is rejected never reaches the handler; it gets the
/// [`AuthError`] response instead. `Vary: Authorization` is added either way.
pub async fn authenticate(pool: PgPool, mut req: Request, next: Next) -> Response {
    let mut response = match resolve_context(&pool, req.headers()).await {
        Ok(context) => {
            req.extensions_mut().insert(context);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Creates the authentication middleware closure
///
/// Captures the pool so the result can be passed to
/// `axum::middleware::from_fn`.
pub fn create_auth_middleware(
    pool: PgPool,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone
{
    move |req, next| {
        let pool = pool.clone();
        Box::pin(authenticate(pool, req, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(activated: bool) -> User {
        User {
            id: 1,
            created_at: Utc::now(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            activated,
            version: 1,
        }
    }

    #[test]
    fn test_anonymous_context() {
        let context = AuthContext::anonymous();

        assert!(context.is_anonymous());
        assert!(matches!(context.require_user(), Err(AuthError::AuthenticationRequired)));
        assert!(matches!(
            context.require_activated_user(),
            Err(AuthError::AuthenticationRequired)
        ));
    }

    #[test]
    fn test_inactive_user_is_forbidden() {
        let context = AuthContext::authenticated(user(false));

        assert!(context.require_user().is_ok());
        assert!(matches!(context.require_activated_user(), Err(AuthError::InactiveAccount)));
        assert!(AuthContext::authenticated(user(true)).require_activated_user().is_ok());
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(
            parse_bearer("Bearer Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"),
            Some("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")
        );
        assert_eq!(parse_bearer("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"), None);
        assert_eq!(parse_bearer("Basic Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"), None);
        assert_eq!(parse_bearer("Bearer short"), None);
        assert_eq!(parse_bearer("Bearer  Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"), None);
    }

    #[tokio::test]
    async fn test_auth_error_body_is_tab_indented_envelope() {
        let response = AuthError::InvalidToken.into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            &body[..],
            b"{\n\t\"error\": \"invalid or missing authentication token\"\n}\n"
        );
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let pool = PgPool::connect_lazy("postgres://greenlight@127.0.0.1:1/unreachable").unwrap();

        let context = resolve_context(&pool, &HeaderMap::new()).await.unwrap();
        assert!(context.is_anonymous());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer short"));
        assert!(matches!(
            resolve_context(&pool, &headers).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_auth_error_into_response() {
        let response = AuthError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = AuthError::InactiveAccount.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let response = AuthError::DatabaseError("connection reset".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
