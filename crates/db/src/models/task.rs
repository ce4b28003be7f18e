use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Deserializer, Serialize};

use super::{
    pagination::{Page, Paginated, fetch_page},
    project::Project,
    sprint::Sprint,
    sub_task::SubTask,
    task_activity::TaskActivity,
    task_asset::TaskAsset,
    user::User,
};
use crate::{
    entities::{project, sprint, task},
    types::{TaskPriority, TaskScope, TaskStatus},
};

const DETAIL_ACTIVITY_LIMIT: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub sprint_id: Option<i64>,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_to: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lightweight project reference embedded in task payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ProjectRef {
    pub id: i64,
    pub name: String,
    pub manager_id: i64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TaskWithRelations {
    #[serde(flatten)]
    pub task: Task,
    pub project: Option<ProjectRef>,
    pub sprint: Option<Sprint>,
    pub assignee: Option<User>,
    pub creator: Option<User>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: TaskWithRelations,
    pub sub_tasks: Vec<SubTask>,
    pub assets: Vec<TaskAsset>,
    pub activities: Vec<TaskActivity>,
}

/// Which sprint a task listing is narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintFilter {
    Backlog,
    Sprint(i64),
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<i64>,
    pub sprint: Option<SprintFilter>,
    pub assigned_to: Option<i64>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTask {
    pub project_id: i64,
    pub sprint_id: Option<i64>,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<i64>,
}

/// Partial update. For `sprint_id` and `assigned_to` an explicit `null`
/// clears the field while an absent key leaves it alone.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct UpdateTask {
    #[serde(default, deserialize_with = "double_option")]
    #[schemars(with = "Option<i64>")]
    pub sprint_id: Option<Option<i64>>,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schemars(with = "Option<i64>")]
    pub assigned_to: Option<Option<i64>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Task {
    fn from_model(model: task::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            sprint_id: model.sprint_id,
            title: model.title,
            date: model.date,
            priority: model.priority,
            status: model.status,
            assigned_to: model.assigned_to,
            created_by: model.created_by,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_id))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_sprint<C: ConnectionTrait>(
        db: &C,
        sprint_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::SprintId.eq(sprint_id))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Latest-first listing limited to `scope`, then narrowed by `filter`.
    pub async fn list<C: ConnectionTrait>(
        db: &C,
        scope: &TaskScope,
        filter: &TaskFilter,
        page: Page,
    ) -> Result<Paginated<Self>, DbErr> {
        let mut query = task::Entity::find();

        if let TaskScope::Restricted {
            project_ids,
            assignee,
        } = scope
        {
            let mut visible = Condition::any().add(task::Column::AssignedTo.eq(*assignee));
            if !project_ids.is_empty() {
                visible = visible.add(task::Column::ProjectId.is_in(project_ids.clone()));
            }
            query = query.filter(visible);
        }

        if let Some(project_id) = filter.project_id {
            query = query.filter(task::Column::ProjectId.eq(project_id));
        }
        match filter.sprint {
            Some(SprintFilter::Backlog) => {
                query = query.filter(task::Column::SprintId.is_null());
            }
            Some(SprintFilter::Sprint(sprint_id)) => {
                query = query.filter(task::Column::SprintId.eq(sprint_id));
            }
            None => {}
        }
        if let Some(assigned_to) = filter.assigned_to {
            query = query.filter(task::Column::AssignedTo.eq(assigned_to));
        }
        if let Some(status) = filter.status {
            query = query.filter(task::Column::Status.eq(status));
        }

        let page = fetch_page(
            db,
            query
                .order_by_desc(task::Column::CreatedAt)
                .order_by_desc(task::Column::Id),
            page,
        )
        .await?;
        Ok(page.map(Self::from_model))
    }

    pub async fn has_assignments<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<bool, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::AssignedTo.eq(user_id))
            .one(db)
            .await?;
        Ok(record.is_some())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        created_by: i64,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = task::ActiveModel {
            project_id: Set(data.project_id),
            sprint_id: Set(data.sprint_id),
            title: Set(data.title.clone()),
            date: Set(data.date),
            priority: Set(data.priority.unwrap_or_default()),
            status: Set(data.status.unwrap_or_default()),
            assigned_to: Set(data.assigned_to),
            created_by: Set(created_by),
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
        payload: &UpdateTask,
    ) -> Result<Self, DbErr> {
        let record = task::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let mut active: task::ActiveModel = record.into();
        if let Some(sprint_id) = payload.sprint_id {
            active.sprint_id = Set(sprint_id);
        }
        if let Some(title) = payload.title.clone() {
            active.title = Set(title);
        }
        if payload.date.is_some() {
            active.date = Set(payload.date);
        }
        if let Some(priority) = payload.priority {
            active.priority = Set(priority);
        }
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        if let Some(assigned_to) = payload.assigned_to {
            active.assigned_to = Set(assigned_to);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = task::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub async fn with_relations<C: ConnectionTrait>(
        db: &C,
        tasks: Vec<Self>,
    ) -> Result<Vec<TaskWithRelations>, DbErr> {
        let project_ids: Vec<i64> = tasks
            .iter()
            .map(|t| t.project_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let sprint_ids: Vec<i64> = tasks
            .iter()
            .filter_map(|t| t.sprint_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let user_ids: Vec<i64> = tasks
            .iter()
            .flat_map(|t| [t.assigned_to, Some(t.created_by)])
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let projects: HashMap<i64, ProjectRef> = if project_ids.is_empty() {
            HashMap::new()
        } else {
            project::Entity::find()
                .filter(project::Column::Id.is_in(project_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|p| {
                    (
                        p.id,
                        ProjectRef {
                            id: p.id,
                            name: p.name,
                            manager_id: p.manager_id,
                        },
                    )
                })
                .collect()
        };
        let sprints: HashMap<i64, Sprint> = if sprint_ids.is_empty() {
            HashMap::new()
        } else {
            sprint::Entity::find()
                .filter(sprint::Column::Id.is_in(sprint_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|model| (model.id, Sprint::from_model(model)))
                .collect()
        };
        let users: HashMap<i64, User> = User::find_by_ids(db, &user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(tasks
            .into_iter()
            .map(|task| TaskWithRelations {
                project: projects.get(&task.project_id).cloned(),
                sprint: task.sprint_id.and_then(|id| sprints.get(&id).cloned()),
                assignee: task.assigned_to.and_then(|id| users.get(&id).cloned()),
                creator: users.get(&task.created_by).cloned(),
                task,
            })
            .collect())
    }

    pub async fn details<C: ConnectionTrait>(db: &C, task: Self) -> Result<TaskDetails, DbErr> {
        let sub_tasks = SubTask::find_by_task(db, task.id).await?;
        let assets = TaskAsset::find_by_task(db, task.id).await?;
        let activities = TaskActivity::latest_for_task(db, task.id, DETAIL_ACTIVITY_LIMIT).await?;
        let task = Self::with_relations(db, vec![task])
            .await?
            .pop()
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        Ok(TaskDetails {
            task,
            sub_tasks,
            assets,
            activities,
        })
    }

    /// Loads the owning project; tasks cannot outlive it.
    pub async fn project<C: ConnectionTrait>(&self, db: &C) -> Result<Project, DbErr> {
        Project::find_by_id(db, self.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::{
        models::{project::CreateProject, user::CreateUser},
        types::Role,
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn user(db: &sea_orm::DatabaseConnection, email: &str, role: Role) -> User {
        User::create(
            db,
            &CreateUser {
                full_name: email.to_string(),
                title: None,
                email: email.to_string(),
                password_hash: "x".to_string(),
                role,
            },
        )
        .await
        .unwrap()
    }

    async fn project(db: &sea_orm::DatabaseConnection, name: &str, manager_id: i64) -> Project {
        Project::create(
            db,
            &CreateProject {
                name: name.to_string(),
                description: None,
                status: None,
                start_date: None,
                end_date: None,
                member_ids: None,
            },
            manager_id,
        )
        .await
        .unwrap()
    }

    fn new_task(project_id: i64, title: &str, assigned_to: Option<i64>) -> CreateTask {
        CreateTask {
            project_id,
            sprint_id: None,
            title: title.to_string(),
            date: None,
            priority: None,
            status: None,
            assigned_to,
        }
    }

    #[tokio::test]
    async fn defaults_and_partial_update() {
        let db = setup_db().await;
        let pm = user(&db, "pm@example.com", Role::Pm).await;
        let dev = user(&db, "dev@example.com", Role::Member).await;
        let p = project(&db, "P", pm.id).await;

        let task = Task::create(&db, &new_task(p.id, "Write docs", Some(dev.id)), pm.id)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::ToDo);
        assert_eq!(task.priority, TaskPriority::Medium);

        let payload: UpdateTask = serde_json::from_value(serde_json::json!({
            "status": "IN_PROGRESS",
            "assigned_to": null
        }))
        .unwrap();
        let updated = Task::update(&db, task.id, &payload).await.unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.assigned_to, None);
        assert_eq!(updated.title, "Write docs");

        let untouched: UpdateTask =
            serde_json::from_value(serde_json::json!({ "title": "Renamed" })).unwrap();
        assert_eq!(untouched.assigned_to, None);
        assert_eq!(untouched.sprint_id, None);
    }

    #[tokio::test]
    async fn restricted_scope_sees_projects_or_assignments() {
        let db = setup_db().await;
        let pm = user(&db, "pm@example.com", Role::Pm).await;
        let dev = user(&db, "dev@example.com", Role::Member).await;
        let idle = user(&db, "idle@example.com", Role::Member).await;
        let mine = project(&db, "Mine", pm.id).await;
        let other = project(&db, "Other", pm.id).await;

        Task::create(&db, &new_task(mine.id, "in my project", None), pm.id)
            .await
            .unwrap();
        Task::create(&db, &new_task(other.id, "assigned to me", Some(dev.id)), pm.id)
            .await
            .unwrap();
        Task::create(&db, &new_task(other.id, "invisible", None), pm.id)
            .await
            .unwrap();

        let scope = TaskScope::Restricted {
            project_ids: vec![mine.id],
            assignee: dev.id,
        };
        let visible = Task::list(&db, &scope, &TaskFilter::default(), Page::default())
            .await
            .unwrap();
        let mut titles: Vec<_> = visible.data.iter().map(|t| t.title.clone()).collect();
        titles.sort();
        assert_eq!(titles, vec!["assigned to me", "in my project"]);

        let empty = TaskScope::Restricted {
            project_ids: Vec::new(),
            assignee: idle.id,
        };
        let none = Task::list(&db, &empty, &TaskFilter::default(), Page::default())
            .await
            .unwrap();
        assert!(none.data.is_empty());

        let backlog = TaskFilter {
            project_id: Some(other.id),
            sprint: Some(SprintFilter::Backlog),
            ..Default::default()
        };
        let all = Task::list(&db, &TaskScope::Unrestricted, &backlog, Page::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
    }
}
