use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use db::{
    models::{
        pagination::{DEFAULT_PER_PAGE, Paginated},
        task::{CreateTask, SprintFilter, Task, TaskDetails, TaskFilter, TaskWithRelations, UpdateTask},
        task_activity::{ActivityFilter, TaskActivity},
        task_asset::TaskAsset,
    },
    types::{ActivityType, TaskStatus},
};
use policy::Actor;
use serde::Deserialize;
use services::services::image::{ImageError, ImageUpload};

use super::{MessageResponse, sub_tasks};
use crate::{
    AppState,
    error::ApiError,
    extract::{AppJson, AppQuery, PageQuery},
    middleware::load_task_middleware,
};

/// Slack on top of the image limit for the multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub project_id: Option<i64>,
    /// A sprint id, or `null` for tasks outside any sprint.
    pub sprint_id: Option<String>,
    pub assigned_to: Option<i64>,
    pub status: Option<TaskStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl TaskQuery {
    fn filter(&self) -> Result<TaskFilter, ApiError> {
        let sprint = match self.sprint_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("null") => Some(SprintFilter::Backlog),
            Some(raw) => Some(SprintFilter::Sprint(raw.parse().map_err(|_| {
                ApiError::Validation("The sprint id field must be an integer.".to_string())
            })?)),
        };
        Ok(TaskFilter {
            project_id: self.project_id,
            sprint,
            assigned_to: self.assigned_to,
            status: self.status,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(rename = "type")]
    pub kind: Option<ActivityType>,
    pub since: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ActivityQuery {
    fn filter(&self) -> Result<ActivityFilter, ApiError> {
        let since = match self.since.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map(|since| since.with_timezone(&Utc))
                    .map_err(|_| {
                        ApiError::Validation("The since field must be a valid date.".to_string())
                    })?,
            ),
        };
        Ok(ActivityFilter {
            kind: self.kind,
            since,
        })
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppQuery(query): AppQuery<TaskQuery>,
) -> Result<Json<Paginated<TaskWithRelations>>, ApiError> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .page(DEFAULT_PER_PAGE);
    let tasks = state
        .tasks()
        .list(state.pool(), &actor, &query.filter()?, page)
        .await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(payload): AppJson<CreateTask>,
) -> Result<(StatusCode, Json<TaskWithRelations>), ApiError> {
    tracing::debug!(
        "Creating task '{}' in project {}",
        payload.title,
        payload.project_id
    );
    let task = state.tasks().create(state.pool(), &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
) -> Result<Json<TaskDetails>, ApiError> {
    Ok(Json(state.tasks().get(state.pool(), &actor, task).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    AppJson(payload): AppJson<UpdateTask>,
) -> Result<Json<TaskWithRelations>, ApiError> {
    let task = state
        .tasks()
        .update(state.pool(), &actor, &task, payload)
        .await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tasks().delete(state.pool(), &actor, &task).await?;
    Ok(Json(MessageResponse::new("Task deleted successfully.")))
}

async fn read_image_field(mut multipart: Multipart) -> Result<ImageUpload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?.to_vec();
        return Ok(ImageUpload {
            bytes,
            content_type,
            file_name,
        });
    }
    Err(ImageError::Missing.into())
}

pub async fn upload_asset(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<TaskAsset>), ApiError> {
    let multipart = multipart.map_err(|_| ApiError::from(ImageError::Missing))?;
    let upload = read_image_field(multipart).await?;
    let asset = state
        .tasks()
        .upload_asset(state.pool(), state.images(), &actor, &task, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn list_activities(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    AppQuery(query): AppQuery<ActivityQuery>,
) -> Result<Json<Paginated<TaskActivity>>, ApiError> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .page(DEFAULT_PER_PAGE);
    let activities = state
        .tasks()
        .activities(state.pool(), &actor, &task, &query.filter()?, page)
        .await?;
    Ok(Json(activities))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let upload_limit = usize::try_from(state.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route(
            "/assets",
            post(upload_asset).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/activities", get(list_activities))
        .merge(sub_tasks::router(state))
        .layer(from_fn_with_state(state.clone(), load_task_middleware));

    let inner = Router::new()
        .route("/", get(list_tasks).post(create_task))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sprint_id: Option<&str>) -> TaskQuery {
        TaskQuery {
            project_id: Some(3),
            sprint_id: sprint_id.map(str::to_string),
            assigned_to: None,
            status: None,
            page: None,
            per_page: None,
        }
    }

    #[test]
    fn sprint_filter_parsing() {
        assert_eq!(query(None).filter().unwrap().sprint, None);
        assert_eq!(
            query(Some("null")).filter().unwrap().sprint,
            Some(SprintFilter::Backlog)
        );
        assert_eq!(
            query(Some("12")).filter().unwrap().sprint,
            Some(SprintFilter::Sprint(12))
        );
        assert!(query(Some("abc")).filter().is_err());
    }

    #[test]
    fn since_must_be_rfc3339() {
        let mut activity = ActivityQuery {
            kind: None,
            since: Some("2026-01-02T03:04:05Z".to_string()),
            page: None,
            per_page: None,
        };
        assert!(activity.filter().unwrap().since.is_some());
        activity.since = Some("yesterday".to_string());
        assert!(activity.filter().is_err());
    }
}
