use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use db::models::user::User;
use serde::Serialize;
use services::services::auth::{
    LoginRequest, RefreshRequest, RegisterRequest, Session, TokenResponse,
};

use super::MessageResponse;
use crate::{AppState, error::ApiError, extract::AppJson};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let tokens = state.auth().register(state.pool(), payload).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth().login(state.pool(), payload).await?))
}

pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth().refresh(state.pool(), payload).await?))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth().logout(state.pool(), &session).await?;
    Ok(Json(MessageResponse::new("Logged out successfully.")))
}

pub async fn me(Extension(user): Extension<User>) -> Json<MeResponse> {
    Json(MeResponse { user })
}

/// Routes reachable without a bearer token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
