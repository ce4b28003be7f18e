use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
};
use db::models::{
    pagination::{DEFAULT_PER_PAGE, Paginated},
    project::Project,
    sprint::{CreateSprint, Sprint, SprintWithTasks, UpdateSprint},
};
use policy::Actor;

use super::MessageResponse;
use crate::{
    AppState,
    error::ApiError,
    extract::{AppJson, AppQuery, PageQuery},
    middleware::load_sprint_middleware,
};

pub async fn list_sprints(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Paginated<SprintWithTasks>>, ApiError> {
    let sprints = state
        .sprints()
        .list(state.pool(), &actor, &project, query.page(DEFAULT_PER_PAGE))
        .await?;
    Ok(Json(sprints))
}

pub async fn create_sprint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
    AppJson(payload): AppJson<CreateSprint>,
) -> Result<(StatusCode, Json<SprintWithTasks>), ApiError> {
    let sprint = state
        .sprints()
        .create(state.pool(), &actor, &project, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(sprint)))
}

pub async fn get_sprint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
    Extension(sprint): Extension<Sprint>,
) -> Result<Json<SprintWithTasks>, ApiError> {
    let sprint = state
        .sprints()
        .get(state.pool(), &actor, &project, sprint)
        .await?;
    Ok(Json(sprint))
}

pub async fn update_sprint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
    Extension(sprint): Extension<Sprint>,
    AppJson(payload): AppJson<UpdateSprint>,
) -> Result<Json<SprintWithTasks>, ApiError> {
    let sprint = state
        .sprints()
        .update(state.pool(), &actor, &project, &sprint, payload)
        .await?;
    Ok(Json(sprint))
}

pub async fn delete_sprint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
    Extension(sprint): Extension<Sprint>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .sprints()
        .delete(state.pool(), &actor, &project, &sprint)
        .await?;
    Ok(Json(MessageResponse::new("Sprint deleted successfully.")))
}

/// Sprint routes relative to a loaded project.
pub fn router(state: &AppState) -> Router<AppState> {
    let sprint_id_router = Router::new()
        .route("/", get(get_sprint).put(update_sprint).delete(delete_sprint))
        .layer(from_fn_with_state(state.clone(), load_sprint_middleware));

    Router::new()
        .route("/sprints", get(list_sprints).post(create_sprint))
        .nest("/sprints/{sprint_id}", sprint_id_router)
}
