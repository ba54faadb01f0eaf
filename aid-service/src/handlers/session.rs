use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use service_core::error::AppError;

use crate::{
    dtos::auth::{LoginRequest, RegisterRequest, RegisterResponse},
    middleware::AuthUser,
    utils::{Password, ValidatedJson},
    AppState,
};

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .auth_service
        .register(&req.mail, &Password::new(req.password))
        .await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse::from(identity))))
}

/// Login with mail and password. Any earlier session for the mail ends.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth_service
        .login(&req.mail, &Password::new(req.password), Utc::now())
        .await?;
    Ok((StatusCode::OK, Json(session)))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.logout(&user.0).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Logged out successfully"
        })),
    ))
}

/// Swap the caller's token for a fresh one.
pub async fn renew(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth_service.renew(&user.0, Utc::now()).await?;
    Ok((StatusCode::OK, Json(session)))
}
