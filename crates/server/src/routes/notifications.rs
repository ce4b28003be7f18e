use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::{delete, get, patch},
};
use db::models::{
    notification::{Notification, NotificationWithRefs},
    pagination::Paginated,
};
use policy::Actor;
use serde::Serialize;
use services::services::notification::DEFAULT_PER_PAGE;

use super::MessageResponse;
use crate::{
    AppState,
    error::ApiError,
    extract::{AppQuery, PageQuery},
    middleware::load_notification_middleware,
};

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub message: String,
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Paginated<NotificationWithRefs>>, ApiError> {
    let feed = state
        .notifications()
        .list(state.pool(), &actor, query.page(DEFAULT_PER_PAGE))
        .await?;
    Ok(Json(feed))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<UnreadCount>, ApiError> {
    let unread_count = state.notifications().unread_count(state.pool(), &actor).await?;
    Ok(Json(UnreadCount { unread_count }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<MarkedRead>, ApiError> {
    let updated = state.notifications().mark_all_read(state.pool(), &actor).await?;
    Ok(Json(MarkedRead {
        message: "All notifications marked as read.".to_string(),
        updated,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(notification): Extension<Notification>,
) -> Result<Json<Notification>, ApiError> {
    let notification = state
        .notifications()
        .mark_read(state.pool(), &actor, &notification)
        .await?;
    Ok(Json(notification))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(notification): Extension<Notification>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .notifications()
        .delete(state.pool(), &actor, &notification)
        .await?;
    Ok(Json(MessageResponse::new("Notification deleted successfully.")))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let notification_id_router = Router::new()
        .route("/", delete(delete_notification))
        .route("/read", patch(mark_read))
        .layer(from_fn_with_state(state.clone(), load_notification_middleware));

    let inner = Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", patch(mark_all_read))
        .nest("/{notification_id}", notification_id_router);

    Router::new().nest("/notifications", inner)
}
