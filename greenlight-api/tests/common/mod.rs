//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Configuration that needs nothing from the environment
//! - A router backed by a lazy pool, for tests that never reach the database
//! - A test context with a real database, skipped when `DATABASE_URL` is unset
//! - A mailer that records what it was asked to send
//! - Request and response helpers

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use greenlight_api::app::{build_router, AppState};
use greenlight_api::config::{ApiConfig, Config, DbConfig, MailConfig};
use greenlight_api::mailer::{Mailer, Template};
use greenlight_shared::auth::password::{hash_password_with, HashCost};
use greenlight_shared::auth::token::generate_token;
use greenlight_shared::db::migrations::{ensure_database_exists, run_migrations};
use greenlight_shared::db::pool::{create_pool, DatabaseConfig};
use greenlight_shared::models::permission::Permissions;
use greenlight_shared::models::token::{Token, TokenScope};
use greenlight_shared::models::user::{CreateUser, User};
use http_body_util::BodyExt;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "pa55word";

/// Configuration for tests; only the database URL varies
pub fn test_config(database_url: &str) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            env: "testing".to_string(),
            cors_origins: vec![],
            shutdown_grace_seconds: 5,
        },
        database: DbConfig {
            url: database_url.to_string(),
            max_connections: 5,
            min_connections: 0,
            idle_timeout_seconds: 60,
            run_migrations: true,
        },
        mail: MailConfig {
            sender: "Greenlight <no-reply@greenlight.test>".to_string(),
        },
    }
}

/// State whose pool never connects
///
/// Fine for every request that is answered before the database is touched.
pub fn offline_state() -> AppState {
    let url = "postgres://greenlight@127.0.0.1:1/unreachable";
    let pool = PgPool::connect_lazy(url).expect("Failed to build lazy pool");
    AppState::with_mailer(pool, test_config(url), Arc::new(RecordingMailer::default()))
}

/// Mailer that keeps every message instead of sending it
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, Template)>>,
}

impl RecordingMailer {
    /// The activation token from the most recent welcome email
    pub fn last_activation_token(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .map(|(_, template)| match template {
                Template::UserWelcome {
                    activation_token, ..
                } => activation_token.clone(),
            })
            .next()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &str, template: &Template) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), template.clone()));
        Ok(())
    }
}

/// Test context backed by a real database
pub struct TestContext {
    pub db: PgPool,
    pub state: AppState,
    pub app: axum::Router,
    pub mailer: Arc<RecordingMailer>,
}

impl TestContext {
    /// Creates, connects and migrates, or returns None when `DATABASE_URL` is unset
    pub async fn new() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        };
        ensure_database_exists(&url)
            .await
            .expect("Failed to create database");

        let db = create_pool(DatabaseConfig {
            url: url.clone(),
            max_connections: 5,
            ..Default::default()
        })
        .await
        .expect("Failed to create pool");
        run_migrations(&db).await.expect("Failed to run migrations");

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::with_mailer(db.clone(), test_config(&url), mailer.clone());
        let app = build_router(state.clone());

        Some(Self {
            db,
            state,
            app,
            mailer,
        })
    }

    /// Creates an activated user with `permissions` and returns a bearer token
    pub async fn authenticated_user(&self, permissions: &[&str]) -> (User, String) {
        let password_hash = hash_password_with(
            TEST_PASSWORD,
            HashCost {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        )
        .expect("Failed to hash password");

        let mut user = User::create(
            &self.db,
            CreateUser {
                name: "Test User".to_string(),
                email: unique_email(),
                password_hash,
            },
        )
        .await
        .expect("Failed to create user");

        user.activated = true;
        User::update(&self.db, &mut user)
            .await
            .expect("Failed to activate user");

        Permissions::grant(&self.db, user.id, permissions)
            .await
            .expect("Failed to grant permissions");

        let token = Token::issue(
            &self.db,
            user.id,
            chrono::Duration::hours(1),
            TokenScope::Authentication,
        )
        .await
        .expect("Failed to issue token");

        (user, token.token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub fn unique_email() -> String {
    format!("user-{}@example.com", generate_token().0.to_lowercase())
}

/// Builds a JSON request, with a bearer token when given
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
