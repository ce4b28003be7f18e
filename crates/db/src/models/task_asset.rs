use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};

use crate::entities::task_asset;

/// Append-only record of an image attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskAsset {
    pub id: i64,
    pub task_id: i64,
    pub image_url: String,
    pub uploaded_by: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl TaskAsset {
    fn from_model(model: task_asset::Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            image_url: model.image_url,
            uploaded_by: model.uploaded_by,
            uploaded_at: model.uploaded_at.into(),
        }
    }

    pub async fn find_by_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task_asset::Entity::find()
            .filter(task_asset::Column::TaskId.eq(task_id))
            .order_by_desc(task_asset::Column::UploadedAt)
            .order_by_desc(task_asset::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        image_url: &str,
        uploaded_by: i64,
    ) -> Result<Self, DbErr> {
        let active = task_asset::ActiveModel {
            task_id: Set(task_id),
            image_url: Set(image_url.to_string()),
            uploaded_by: Set(uploaded_by),
            uploaded_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }
}
