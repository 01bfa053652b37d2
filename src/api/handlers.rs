//! HTTP API handlers.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

/// Body of `GET /`.
pub const GREETING: &str = "💗 HELLO AXUM!\n";

/// Message of `GET /hello`.
pub const JSON_GREETING: &str = "💗 HELLO AXUM FROM JSON!";

/// Body of `GET /health`.
pub const HEALTH_OK: &str = "💗 AXUM: HEALTH CHECK SUCCESS\n";

/// JSON greeting response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloResponse {
    /// Greeting text.
    pub message: String,
}

/// Root handler - plain-text greeting.
pub async fn root() -> &'static str {
    GREETING
}

/// JSON greeting handler.
pub async fn hello() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HelloResponse {
            message: JSON_GREETING.to_string(),
        }),
    )
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, HEALTH_OK)
}
