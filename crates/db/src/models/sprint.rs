use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};

use super::{
    pagination::{Page, Paginated, fetch_page},
    task::Task,
};
use crate::{entities::sprint, types::SprintStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Sprint {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SprintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SprintWithTasks {
    #[serde(flatten)]
    pub sprint: Sprint,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateSprint {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: Option<SprintStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct UpdateSprint {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<SprintStatus>,
}

impl Sprint {
    pub(crate) fn from_model(model: sprint::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            name: model.name,
            start_date: model.start_date,
            end_date: model.end_date,
            status: model.status,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = sprint::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    /// Looks a sprint up by id, only if it belongs to `project_id`.
    pub async fn find_in_project<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        id: i64,
    ) -> Result<Option<Self>, DbErr> {
        let record = sprint::Entity::find_by_id(id)
            .filter(sprint::Column::ProjectId.eq(project_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = sprint::Entity::find()
            .filter(sprint::Column::ProjectId.eq(project_id))
            .order_by_asc(sprint::Column::StartDate)
            .order_by_asc(sprint::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Latest-first page of a project's sprints.
    pub async fn list_for_project<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        page: Page,
    ) -> Result<Paginated<Self>, DbErr> {
        let query = sprint::Entity::find()
            .filter(sprint::Column::ProjectId.eq(project_id))
            .order_by_desc(sprint::Column::CreatedAt)
            .order_by_desc(sprint::Column::Id);
        let page = fetch_page(db, query, page).await?;
        Ok(page.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        data: &CreateSprint,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = sprint::ActiveModel {
            project_id: Set(project_id),
            name: Set(data.name.clone()),
            start_date: Set(data.start_date),
            end_date: Set(data.end_date),
            status: Set(data.status.unwrap_or_default()),
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
        payload: &UpdateSprint,
    ) -> Result<Self, DbErr> {
        let record = sprint::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Sprint not found".to_string()))?;

        let mut active: sprint::ActiveModel = record.into();
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if let Some(start_date) = payload.start_date {
            active.start_date = Set(start_date);
        }
        if let Some(end_date) = payload.end_date {
            active.end_date = Set(end_date);
        }
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Deletes the sprint; its tasks fall back to the backlog.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = sprint::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub async fn with_tasks<C: ConnectionTrait>(
        db: &C,
        sprint: Self,
    ) -> Result<SprintWithTasks, DbErr> {
        let tasks = Task::find_by_sprint(db, sprint.id).await?;
        Ok(SprintWithTasks { sprint, tasks })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::{
        models::{
            project::{CreateProject, Project},
            task::CreateTask,
            user::{CreateUser, User},
        },
        types::Role,
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn deleting_sprint_moves_tasks_to_backlog() {
        let db = setup_db().await;
        let pm = User::create(
            &db,
            &CreateUser {
                full_name: "Pm".to_string(),
                title: None,
                email: "pm@example.com".to_string(),
                password_hash: "x".to_string(),
                role: Role::Pm,
            },
        )
        .await
        .unwrap();
        let project = Project::create(
            &db,
            &CreateProject {
                name: "P".to_string(),
                description: None,
                status: None,
                start_date: None,
                end_date: None,
                member_ids: None,
            },
            pm.id,
        )
        .await
        .unwrap();
        let sprint = Sprint::create(
            &db,
            project.id,
            &CreateSprint {
                name: "S1".to_string(),
                start_date: date("2025-01-01"),
                end_date: date("2025-01-14"),
                status: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(sprint.status, SprintStatus::Planned);
        assert!(Sprint::find_in_project(&db, project.id + 1, sprint.id).await.unwrap().is_none());

        let task = Task::create(
            &db,
            &CreateTask {
                project_id: project.id,
                sprint_id: Some(sprint.id),
                title: "Ship".to_string(),
                date: None,
                priority: None,
                status: None,
                assigned_to: None,
            },
            pm.id,
        )
        .await
        .unwrap();

        let loaded = Sprint::with_tasks(&db, sprint.clone()).await.unwrap();
        assert_eq!(loaded.tasks.len(), 1);

        Sprint::delete(&db, sprint.id).await.unwrap();
        let task = Task::find_by_id(&db, task.id).await.unwrap().unwrap();
        assert_eq!(task.sprint_id, None);
    }
}
