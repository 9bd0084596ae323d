// handlers/public/pages.rs - GET /health, GET /anmelden

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "backend": "ok" }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "backend unavailable",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}

/// Login is rendered by the frontend; this points clients at the login API.
pub async fn login_page() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "login": { "method": "POST", "path": "/api/auth/login", "body": { "email": "string", "password": "string" } },
            "logout": { "method": "POST", "path": "/api/auth/logout" }
        }
    }))
}
