use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::AuthUser,
    models::{
        api::{ApiResponse, MessageResponse},
        user::{LoginRequest, RegisterRequest},
    },
    services::{auth_service, auth_service::AuthService, AppState},
};

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    tracing::info!("Registering new user: {}", req.email);

    let response = AuthService::new(&state).register(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User registered successfully", response),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let response = AuthService::new(&state).login(req).await?;
    Ok(ApiResponse::ok(response))
}

/// POST /api/auth/logout - the presented token stays revoked until it expires
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    auth_service::revoke_token(&state, &user).await?;
    tracing::info!("User {} logged out", user.id);
    Ok(MessageResponse::new("Logged out successfully"))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let profile = AuthService::new(&state).current_user(&user.id).await?;
    Ok(ApiResponse::ok(profile))
}
