/// Health check endpoint
///
/// Reports that the server is up, with the environment and version it is
/// running. It does not touch the database.
///
/// # Endpoint
///
/// ```text
/// GET /v1/healthcheck
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "available",
///   "system_info": {
///     "environment": "development",
///     "version": "0.1.0"
///   }
/// }
/// ```

use crate::{app::AppState, codec};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `available` while the server answers
    pub status: String,

    pub system_info: SystemInfo,
}

/// Environment and build details
#[derive(Debug, Serialize, Deserialize)]
pub struct SystemInfo {
    pub environment: String,
    pub version: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Response {
    let health = HealthResponse {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment: state.config.api.env.clone(),
            version: greenlight_shared::VERSION.to_string(),
        },
    };

    codec::encode_document(StatusCode::OK, &health, HeaderMap::new())
}
