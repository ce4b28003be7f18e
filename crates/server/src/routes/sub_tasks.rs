use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, put},
};
use db::models::{
    sub_task::{CreateSubTask, SubTask, UpdateSubTask},
    task::Task,
};
use policy::Actor;

use super::MessageResponse;
use crate::{
    AppState, error::ApiError, extract::AppJson, middleware::load_sub_task_middleware,
};

pub async fn list_sub_tasks(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
) -> Result<Json<Vec<SubTask>>, ApiError> {
    Ok(Json(state.sub_tasks().list(state.pool(), &actor, &task).await?))
}

pub async fn create_sub_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    AppJson(payload): AppJson<CreateSubTask>,
) -> Result<(StatusCode, Json<SubTask>), ApiError> {
    let sub_task = state
        .sub_tasks()
        .create(state.pool(), &actor, &task, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(sub_task)))
}

pub async fn update_sub_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    Extension(sub_task): Extension<SubTask>,
    AppJson(payload): AppJson<UpdateSubTask>,
) -> Result<Json<SubTask>, ApiError> {
    let sub_task = state
        .sub_tasks()
        .update(state.pool(), &actor, &task, &sub_task, payload)
        .await?;
    Ok(Json(sub_task))
}

pub async fn delete_sub_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    Extension(sub_task): Extension<SubTask>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .sub_tasks()
        .delete(state.pool(), &actor, &task, &sub_task)
        .await?;
    Ok(Json(MessageResponse::new("SubTask deleted successfully.")))
}

/// Sub-task routes relative to a loaded task.
pub fn router(state: &AppState) -> Router<AppState> {
    let sub_task_id_router = Router::new()
        .route("/", put(update_sub_task).delete(delete_sub_task))
        .layer(from_fn_with_state(state.clone(), load_sub_task_middleware));

    Router::new()
        .route("/sub-tasks", get(list_sub_tasks).post(create_sub_task))
        .nest("/sub-tasks/{sub_task_id}", sub_task_id_router)
}
