/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use greenlight_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = greenlight_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    background::BackgroundTasks,
    config::Config,
    error::ApiError,
    mailer::{LogMailer, Mailer},
};
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use greenlight_shared::auth::middleware::create_auth_middleware;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Outgoing mail, only ever used from background tasks
    pub mailer: Arc<dyn Mailer>,

    /// Work that outlives the request, drained on shutdown
    pub background: BackgroundTasks,
}

impl AppState {
    /// Creates new application state with the logging mailer
    pub fn new(db: PgPool, config: Config) -> Self {
        let mailer = Arc::new(LogMailer::new(config.mail.sender.clone()));
        Self::with_mailer(db, config, mailer)
    }

    /// Creates new application state with a caller-supplied mailer
    pub fn with_mailer(db: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            mailer,
            background: BackgroundTasks::new(),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /v1/
/// ├── GET    /healthcheck
/// ├── /movies                     # movies:read / movies:write
/// │   ├── GET    /
/// │   ├── POST   /
/// │   ├── GET    /:id
/// │   ├── PUT    /:id
/// │   ├── PATCH  /:id
/// │   └── DELETE /:id
/// ├── /users
/// │   ├── POST   /                # register
/// │   └── PUT    /activated       # consume activation token
/// └── POST   /tokens/authentication
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Authentication (resolves the bearer token, anonymous without one)
/// 2. JSON body for 405 responses
/// 3. Logging (tower-http TraceLayer)
/// 4. CORS (tower-http CorsLayer)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let movie_routes = Router::new()
        .route(
            "/",
            get(routes::movies::list_movies).post(routes::movies::create_movie),
        )
        .route(
            "/:id",
            get(routes::movies::show_movie)
                .put(routes::movies::replace_movie)
                .patch(routes::movies::update_movie)
                .delete(routes::movies::delete_movie),
        );

    let user_routes = Router::new()
        .route("/", post(routes::users::register_user))
        .route("/activated", put(routes::users::activate_user));

    let token_routes = Router::new()
        .route("/authentication", post(routes::tokens::create_authentication_token));

    let v1_routes = Router::new()
        .route("/healthcheck", get(routes::health::health_check))
        .nest("/movies", movie_routes)
        .nest("/users", user_routes)
        .nest("/tokens", token_routes);

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .nest("/v1", v1_routes)
        .fallback(not_found)
        .layer(middleware::from_fn(create_auth_middleware(state.db.clone())))
        .layer(middleware::from_fn(method_not_allowed))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// CORS for the trusted origins
///
/// `*` allows everything; no origins means no cross-origin access.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(60))
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

/// Replaces axum's empty 405 body with the JSON error envelope
async fn method_not_allowed(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;

    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut replaced = ApiError::MethodNotAllowed(format!(
        "the {method} method is not supported for this resource"
    ))
    .into_response();
    if let Some(allow) = allow {
        replaced.headers_mut().insert(header::ALLOW, allow);
    }
    replaced
}
