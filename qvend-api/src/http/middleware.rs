// HTTP middleware

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::{AppError, AppState};

/// Proof that the request carries a valid admin bearer token.
///
/// Extracting this on a handler is what gates it: the console routes
/// requiring the administrator all take `AuthAdmin` as an argument.
#[derive(Debug, Clone)]
pub struct AuthAdmin;

impl<S> FromRequestParts<S> for AuthAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|e| AppError::unauthorized(format!("Invalid Authorization header: {e}")))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Expected Bearer token"))?;

        app_state.auth_service.verify(token)?;

        Ok(Self)
    }
}
