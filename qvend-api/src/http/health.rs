//! Health check endpoint
//!
//! Provides a simple liveness check for monitoring probes.

use axum::{response::IntoResponse, Json};

/// GET /api/health (no authentication)
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "q-profile-vending",
    }))
}
