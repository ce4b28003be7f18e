use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
};
use db::models::{
    pagination::{DEFAULT_PER_PAGE, Paginated},
    project::{CreateProject, Project, ProjectDetails, ProjectWithPeople, UpdateProject},
};
use policy::Actor;

use super::{MessageResponse, sprints};
use crate::{
    AppState,
    error::ApiError,
    extract::{AppJson, AppQuery, PageQuery},
    middleware::load_project_middleware,
};

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Paginated<ProjectWithPeople>>, ApiError> {
    let projects = state
        .projects()
        .list(state.pool(), &actor, query.page(DEFAULT_PER_PAGE))
        .await?;
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(payload): AppJson<CreateProject>,
) -> Result<(StatusCode, Json<ProjectDetails>), ApiError> {
    let project = state.projects().create(state.pool(), &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
) -> Result<Json<ProjectDetails>, ApiError> {
    Ok(Json(state.projects().get(state.pool(), &actor, project).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
    AppJson(payload): AppJson<UpdateProject>,
) -> Result<Json<ProjectWithPeople>, ApiError> {
    let updated = state
        .projects()
        .update(state.pool(), &actor, &project, payload)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.projects().delete(state.pool(), &actor, &project).await?;
    Ok(Json(MessageResponse::new("Project deleted successfully.")))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let project_id_router = Router::new()
        .route("/", get(get_project).put(update_project).delete(delete_project))
        .merge(sprints::router(state))
        .layer(from_fn_with_state(state.clone(), load_project_middleware));

    let inner = Router::new()
        .route("/", get(list_projects).post(create_project))
        .nest("/{project_id}", project_id_router);

    Router::new().nest("/projects", inner)
}
