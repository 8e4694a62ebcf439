// Admin login

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let token = state.auth_service.login(&request.password)?;

    info!("Admin logged in");

    Ok(Json(LoginResponse {
        token,
        expires_in: state.auth_service.token_ttl_seconds(),
    }))
}
