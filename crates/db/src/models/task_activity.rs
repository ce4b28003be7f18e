use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pagination::{Page, Paginated, fetch_page};
use crate::{entities::task_activity, types::ActivityType};

/// Immutable audit entry in a task's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskActivity {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub content: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTaskActivity {
    pub task_id: i64,
    pub user_id: i64,
    pub kind: ActivityType,
    pub content: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub kind: Option<ActivityType>,
    pub since: Option<DateTime<Utc>>,
}

impl TaskActivity {
    fn from_model(model: task_activity::Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            user_id: model.user_id,
            kind: model.kind,
            content: model.content,
            metadata: model.metadata,
            created_at: model.created_at.into(),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTaskActivity,
    ) -> Result<Self, DbErr> {
        let active = task_activity::ActiveModel {
            task_id: Set(data.task_id),
            user_id: Set(data.user_id),
            kind: Set(data.kind),
            content: Set(data.content.clone()),
            metadata: Set(data.metadata.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn latest_for_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        limit: u64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task_activity::Entity::find()
            .filter(task_activity::Column::TaskId.eq(task_id))
            .order_by_desc(task_activity::Column::CreatedAt)
            .order_by_desc(task_activity::Column::Id)
            .limit(limit)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn list_for_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        filter: &ActivityFilter,
        page: Page,
    ) -> Result<Paginated<Self>, DbErr> {
        let mut query =
            task_activity::Entity::find().filter(task_activity::Column::TaskId.eq(task_id));
        if let Some(kind) = filter.kind {
            query = query.filter(task_activity::Column::Kind.eq(kind));
        }
        if let Some(since) = filter.since {
            query = query.filter(task_activity::Column::CreatedAt.gt(since));
        }
        let page = fetch_page(
            db,
            query
                .order_by_desc(task_activity::Column::CreatedAt)
                .order_by_desc(task_activity::Column::Id),
            page,
        )
        .await?;
        Ok(page.map(Self::from_model))
    }
}
