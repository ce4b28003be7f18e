use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};

use crate::entities::sub_task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubTask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub tag: Option<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateSubTask {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub tag: Option<String>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct UpdateSubTask {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub tag: Option<String>,
    pub is_completed: Option<bool>,
}

impl SubTask {
    fn from_model(model: sub_task::Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            title: model.title,
            date: model.date,
            tag: model.tag,
            is_completed: model.is_completed,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// Looks a sub-task up by id, only if it belongs to `task_id`.
    pub async fn find_in_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        id: i64,
    ) -> Result<Option<Self>, DbErr> {
        let record = sub_task::Entity::find_by_id(id)
            .filter(sub_task::Column::TaskId.eq(task_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = sub_task::Entity::find()
            .filter(sub_task::Column::TaskId.eq(task_id))
            .order_by_asc(sub_task::Column::CreatedAt)
            .order_by_asc(sub_task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        data: &CreateSubTask,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = sub_task::ActiveModel {
            task_id: Set(task_id),
            title: Set(data.title.clone()),
            date: Set(data.date),
            tag: Set(data.tag.clone()),
            is_completed: Set(data.is_completed.unwrap_or(false)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        payload: &UpdateSubTask,
    ) -> Result<Self, DbErr> {
        let record = sub_task::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Sub-task not found".to_string()))?;

        let mut active: sub_task::ActiveModel = record.into();
        if let Some(title) = payload.title.clone() {
            active.title = Set(title);
        }
        if payload.date.is_some() {
            active.date = Set(payload.date);
        }
        if payload.tag.is_some() {
            active.tag = Set(payload.tag.clone());
        }
        if let Some(is_completed) = payload.is_completed {
            active.is_completed = Set(is_completed);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = sub_task::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
