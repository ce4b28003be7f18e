use std::{fmt::Display, future::Future};

use axum::{
    Extension,
    extract::{Path, Request, State, rejection::PathRejection},
    middleware::Next,
    response::Response,
};
use db::models::{
    notification::Notification, project::Project, sprint::Sprint, sub_task::SubTask, task::Task,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ProjectPath {
    pub project_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SprintPath {
    pub sprint_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TaskPath {
    pub task_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubTaskPath {
    pub sub_task_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct NotificationPath {
    pub notification_id: i64,
}

fn not_found(model_name: &str) -> ApiError {
    ApiError::NotFound(format!("{model_name} not found."))
}

/// Non-numeric ids cannot match a row, so they read as a missing model.
fn path_id<T>(model_name: &'static str, path: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    match path {
        Ok(Path(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!("Invalid {model_name} path: {}", rejection.body_text());
            Err(not_found(model_name))
        }
    }
}

async fn fetch_model_or_status<M, E, Fut>(
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::debug!("{model_name} {model_id} not found");
            Err(not_found(model_name))
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(ApiError::Internal(format!("Failed to fetch {model_name}")))
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    mut request: Request,
    next: Next,
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_status(model_name, model_id, load_future).await?;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_project_middleware(
    State(state): State<AppState>,
    path: Result<Path<ProjectPath>, PathRejection>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ProjectPath { project_id } = path_id("Project", path)?;
    load_request_extension(
        request,
        next,
        "Project",
        project_id,
        Project::find_by_id(state.pool(), project_id),
    )
    .await
}

/// Loads a sprint of the already loaded project; sprints of other projects
/// are reported as missing.
pub async fn load_sprint_middleware(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    path: Result<Path<SprintPath>, PathRejection>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let SprintPath { sprint_id } = path_id("Sprint", path)?;
    load_request_extension(
        request,
        next,
        "Sprint",
        sprint_id,
        Sprint::find_in_project(state.pool(), project.id, sprint_id),
    )
    .await
}

pub async fn load_task_middleware(
    State(state): State<AppState>,
    path: Result<Path<TaskPath>, PathRejection>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TaskPath { task_id } = path_id("Task", path)?;
    load_request_extension(
        request,
        next,
        "Task",
        task_id,
        Task::find_by_id(state.pool(), task_id),
    )
    .await
}

pub async fn load_sub_task_middleware(
    State(state): State<AppState>,
    Extension(task): Extension<Task>,
    path: Result<Path<SubTaskPath>, PathRejection>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let SubTaskPath { sub_task_id } = path_id("SubTask", path)?;
    load_request_extension(
        request,
        next,
        "SubTask",
        sub_task_id,
        SubTask::find_in_task(state.pool(), task.id, sub_task_id),
    )
    .await
}

pub async fn load_notification_middleware(
    State(state): State<AppState>,
    path: Result<Path<NotificationPath>, PathRejection>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let NotificationPath { notification_id } = path_id("Notification", path)?;
    load_request_extension(
        request,
        next,
        "Notification",
        notification_id,
        Notification::find_by_id(state.pool(), notification_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::fetch_model_or_status;

    #[tokio::test]
    async fn fetch_model_or_status_returns_not_found_on_missing_model() {
        let result =
            fetch_model_or_status::<String, &'static str, _>("Project", 7, async { Ok(None) })
                .await;

        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fetch_model_or_status_returns_internal_error_on_fetch_failure() {
        let result = fetch_model_or_status::<String, &'static str, _>("Project", 7, async {
            Err("db unavailable")
        })
        .await;

        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
