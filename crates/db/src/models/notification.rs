use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use super::{
    pagination::{Page, Paginated, fetch_page},
    task::ProjectRef,
};
use crate::{
    entities::{notification, project, task},
    types::NotificationType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub related_task_id: Option<i64>,
    pub related_project_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct TaskRef {
    pub id: i64,
    pub title: String,
}

/// Feed entry with the titles of the entities it points at.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct NotificationWithRefs {
    #[serde(flatten)]
    pub notification: Notification,
    pub related_task: Option<TaskRef>,
    pub related_project: Option<ProjectRef>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: i64,
    pub title: String,
    pub message: Option<String>,
    pub kind: NotificationType,
    pub related_task_id: Option<i64>,
    pub related_project_id: Option<i64>,
}

impl Notification {
    fn from_model(model: notification::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            message: model.message,
            kind: model.kind,
            related_task_id: model.related_task_id,
            related_project_id: model.related_project_id,
            is_read: model.is_read,
            created_at: model.created_at.into(),
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = notification::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateNotification,
    ) -> Result<Self, DbErr> {
        let active = notification::ActiveModel {
            user_id: Set(data.user_id),
            title: Set(data.title.clone()),
            message: Set(data.message.clone()),
            kind: Set(data.kind),
            related_task_id: Set(data.related_task_id),
            related_project_id: Set(data.related_project_id),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn list_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        page: Page,
    ) -> Result<Paginated<NotificationWithRefs>, DbErr> {
        let query = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id);
        let page = fetch_page(db, query, page).await?;

        let mut data = Vec::with_capacity(page.data.len());
        for model in &page.data {
            let related_task = match model.related_task_id {
                Some(id) => task::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .map(|t| TaskRef { id: t.id, title: t.title }),
                None => None,
            };
            let related_project = match model.related_project_id {
                Some(id) => project::Entity::find_by_id(id).one(db).await?.map(|p| ProjectRef {
                    id: p.id,
                    name: p.name,
                    manager_id: p.manager_id,
                }),
                None => None,
            };
            data.push((related_task, related_project));
        }

        let mut refs = data.into_iter();
        Ok(page.map(|model| {
            let (related_task, related_project) = refs.next().unwrap_or((None, None));
            NotificationWithRefs {
                notification: Self::from_model(model),
                related_task,
                related_project,
            }
        }))
    }

    /// Marks one notification read. Already-read rows are left untouched.
    pub async fn mark_read<C: ConnectionTrait>(db: &C, id: i64) -> Result<Self, DbErr> {
        let record = notification::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Notification not found".to_string()))?;
        if record.is_read {
            return Ok(Self::from_model(record));
        }
        let mut active: notification::ActiveModel = record.into();
        active.is_read = Set(true);
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn mark_all_read<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<u64, DbErr> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn unread_count<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<u64, DbErr> {
        notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(db)
            .await
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = notification::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::{
        models::user::{CreateUser, User},
        types::Role,
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn note(user_id: i64, title: &str) -> CreateNotification {
        CreateNotification {
            user_id,
            title: title.to_string(),
            message: None,
            kind: NotificationType::Mention,
            related_task_id: None,
            related_project_id: None,
        }
    }

    #[tokio::test]
    async fn read_state_transitions() {
        let db = setup_db().await;
        let user = User::create(
            &db,
            &CreateUser {
                full_name: "Reader".to_string(),
                title: None,
                email: "reader@example.com".to_string(),
                password_hash: "x".to_string(),
                role: Role::Member,
            },
        )
        .await
        .unwrap();

        let first = Notification::create(&db, &note(user.id, "one")).await.unwrap();
        Notification::create(&db, &note(user.id, "two")).await.unwrap();
        Notification::create(&db, &note(user.id, "three")).await.unwrap();
        assert_eq!(Notification::unread_count(&db, user.id).await.unwrap(), 3);

        let read = Notification::mark_read(&db, first.id).await.unwrap();
        assert!(read.is_read);
        let again = Notification::mark_read(&db, first.id).await.unwrap();
        assert_eq!(again, read);
        assert_eq!(Notification::unread_count(&db, user.id).await.unwrap(), 2);

        assert_eq!(Notification::mark_all_read(&db, user.id).await.unwrap(), 2);
        assert_eq!(Notification::unread_count(&db, user.id).await.unwrap(), 0);

        let feed = Notification::list_for_user(&db, user.id, Page::new(None, None, 20))
            .await
            .unwrap();
        assert_eq!(feed.total, 3);
        assert_eq!(feed.per_page, 20);
        assert_eq!(feed.data[0].notification.title, "three");
    }
}
