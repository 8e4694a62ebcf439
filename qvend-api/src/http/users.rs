// User management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use qvend_core::models::{CreateUserRequest, User, UserId};

use super::{middleware::AuthAdmin, AppResult, AppState};

/// POST /api/users
pub async fn create_user(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.user_service.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users
pub async fn list_users(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<User>>> {
    let users = state.user_service.list_users().await?;
    Ok(Json(users))
}

/// GET /api/users/{user_id}
pub async fn get_user(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<User>> {
    let user = state
        .user_service
        .get_user(&UserId::from_string(user_id))
        .await?;
    Ok(Json(user))
}

/// DELETE /api/users/{user_id}
pub async fn delete_user(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .user_service
        .delete_user(&UserId::from_string(user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/{user_id}/reset-invitation
pub async fn reset_invitation(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<User>> {
    let user = state
        .user_service
        .reset_invitation(&UserId::from_string(user_id))
        .await?;
    Ok(Json(user))
}
