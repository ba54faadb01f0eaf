use axum::{response::IntoResponse, Json};

use crate::middleware::AuthUser;

#[axum::debug_handler]
pub async fn get_me(user: AuthUser) -> impl IntoResponse {
    Json(user.0)
}
