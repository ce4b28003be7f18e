use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};
use serde_json::Value;
use services::services::{docs, postman};

use crate::AppState;

pub async fn api_html() -> Html<String> {
    Html(docs::listing_html())
}

pub async fn api_json(State(state): State<AppState>) -> Json<Value> {
    Json(docs::openapi(&state.public_url()))
}

pub async fn postman_collection(State(state): State<AppState>) -> Json<Value> {
    Json(postman::convert(&docs::openapi(&state.public_url())))
}

pub async fn download_postman_collection(State(state): State<AppState>) -> impl IntoResponse {
    let collection = postman::convert(&docs::openapi(&state.public_url()));
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", postman::DOWNLOAD_FILE_NAME),
        )],
        Json(collection),
    )
}

/// Documentation pages served outside `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(api_html))
        .route("/api-docs", get(api_html))
        .route("/api-docs.json", get(api_json))
}

/// Postman export, nested under `/api` without authentication.
pub fn public_api_router() -> Router<AppState> {
    Router::new()
        .route("/postman-collection", get(postman_collection))
        .route("/postman-collection/download", get(download_postman_collection))
}
