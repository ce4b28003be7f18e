use db::{
    ConnectionTrait, DbPool, TransactionTrait,
    models::{
        pagination::{Page, Paginated},
        project::Project,
        sprint::Sprint,
        task::{CreateTask, Task, TaskDetails, TaskFilter, TaskWithRelations, UpdateTask},
        task_activity::{ActivityFilter, TaskActivity},
        task_asset::TaskAsset,
        user::User,
    },
};
use policy::{Action, Actor, ProjectFacts, Resource, TaskFacts};

use super::{
    dispatcher::{Dispatcher, TaskChange, plan_asset_added, plan_task_created, plan_task_updated},
    error::{Result, ServiceError, require_text, require_users},
    image::{ImageStore, ImageUpload},
    visibility::{self, authorize},
};

const TITLE_MAX_LEN: usize = 255;

/// A task together with the facts the policy needs about it.
struct TaskContext {
    project: Project,
    project_facts: ProjectFacts,
    task_facts: TaskFacts,
}

#[derive(Clone, Default)]
pub struct TaskService;

impl TaskService {
    pub fn new() -> Self {
        Self
    }

    async fn context(&self, pool: &DbPool, actor: &Actor, task: &Task) -> Result<TaskContext> {
        let project = task.project(pool).await?;
        let project_facts = visibility::project_facts(pool, actor, &project).await?;
        Ok(TaskContext {
            project,
            project_facts,
            task_facts: visibility::task_facts(task),
        })
    }

    /// Rejects a sprint that does not exist or lives in another project.
    async fn require_sprint_in_project<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        sprint_id: i64,
    ) -> Result<()> {
        match Sprint::find_by_id(db, sprint_id).await? {
            None => Err(ServiceError::validation("The selected sprint_id is invalid.")),
            Some(sprint) if sprint.project_id != project_id => Err(ServiceError::validation(
                "Sprint does not belong to this project.",
            )),
            Some(_) => Ok(()),
        }
    }

    async fn with_relations(&self, pool: &DbPool, task: Task) -> Result<TaskWithRelations> {
        Task::with_relations(pool, vec![task])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("Task"))
    }

    pub async fn list(
        &self,
        pool: &DbPool,
        actor: &Actor,
        filter: &TaskFilter,
        page: Page,
    ) -> Result<Paginated<TaskWithRelations>> {
        let scope = visibility::task_scope(pool, actor).await?;
        let Paginated {
            data,
            current_page,
            per_page,
            total,
            last_page,
        } = Task::list(pool, &scope, filter, page).await?;
        Ok(Paginated {
            data: Task::with_relations(pool, data).await?,
            current_page,
            per_page,
            total,
            last_page,
        })
    }

    pub async fn get(&self, pool: &DbPool, actor: &Actor, task: Task) -> Result<TaskDetails> {
        let ctx = self.context(pool, actor, &task).await?;
        authorize(
            actor,
            Action::Read,
            &Resource::Task {
                project: ctx.project_facts,
                task: ctx.task_facts,
            },
        )?;
        Ok(Task::details(pool, task).await?)
    }

    pub async fn create(
        &self,
        pool: &DbPool,
        actor: &Actor,
        payload: CreateTask,
    ) -> Result<TaskWithRelations> {
        let project = Project::find_by_id(pool, payload.project_id)
            .await?
            .ok_or_else(|| ServiceError::validation("The selected project_id is invalid."))?;
        let facts = visibility::project_facts(pool, actor, &project).await?;
        authorize(actor, Action::Create, &Resource::TaskCollection(facts))?;

        require_text("title", &payload.title, TITLE_MAX_LEN)?;
        if let Some(sprint_id) = payload.sprint_id {
            Self::require_sprint_in_project(pool, project.id, sprint_id).await?;
        }
        if let Some(assignee) = payload.assigned_to {
            require_users(pool, "assigned_to", &[assignee]).await?;
        }

        let tx = pool.begin().await?;
        let task = Task::create(&tx, &payload, actor.id).await?;
        Dispatcher::apply(&tx, plan_task_created(actor.id, &task)).await?;
        tx.commit().await?;

        tracing::debug!(task_id = task.id, project_id = project.id, "Task created");
        self.with_relations(pool, task).await
    }

    /// Applies a partial update and records what changed.
    pub async fn update(
        &self,
        pool: &DbPool,
        actor: &Actor,
        task: &Task,
        payload: UpdateTask,
    ) -> Result<TaskWithRelations> {
        let ctx = self.context(pool, actor, task).await?;
        authorize(
            actor,
            Action::Update,
            &Resource::Task {
                project: ctx.project_facts,
                task: ctx.task_facts,
            },
        )?;

        if let Some(title) = &payload.title {
            require_text("title", title, TITLE_MAX_LEN)?;
        }
        if let Some(Some(sprint_id)) = payload.sprint_id {
            Self::require_sprint_in_project(pool, task.project_id, sprint_id).await?;
        }
        if let Some(Some(assignee)) = payload.assigned_to {
            require_users(pool, "assigned_to", &[assignee]).await?;
        }

        let tx = pool.begin().await?;
        let updated = Task::update(&tx, task.id, &payload).await?;
        let assignee_name = match updated.assigned_to {
            Some(id) if updated.assigned_to != task.assigned_to => {
                User::find_by_id(&tx, id).await?.map(|user| user.full_name)
            }
            _ => None,
        };
        let effects = plan_task_updated(TaskChange {
            actor_id: actor.id,
            before: task,
            after: &updated,
            manager_id: ctx.project.manager_id,
            new_assignee_name: assignee_name.as_deref(),
        });
        Dispatcher::apply(&tx, effects).await?;
        tx.commit().await?;

        self.with_relations(pool, updated).await
    }

    pub async fn delete(&self, pool: &DbPool, actor: &Actor, task: &Task) -> Result<()> {
        let ctx = self.context(pool, actor, task).await?;
        authorize(
            actor,
            Action::Delete,
            &Resource::Task {
                project: ctx.project_facts,
                task: ctx.task_facts,
            },
        )?;
        if Task::delete(pool, task.id).await? == 0 {
            return Err(ServiceError::NotFound("Task"));
        }
        tracing::info!(task_id = task.id, actor_id = actor.id, "Task deleted");
        Ok(())
    }

    /// Stores an image for the task and logs it in the task history.
    pub async fn upload_asset(
        &self,
        pool: &DbPool,
        store: &ImageStore,
        actor: &Actor,
        task: &Task,
        upload: ImageUpload,
    ) -> Result<TaskAsset> {
        let ctx = self.context(pool, actor, task).await?;
        authorize(
            actor,
            Action::Create,
            &Resource::Asset {
                project: ctx.project_facts,
                task: ctx.task_facts,
            },
        )?;

        let url = store.store(&upload).await?;
        let result = Self::record_asset(pool, actor, task, &url).await;
        if result.is_err() {
            store.discard(&url).await;
        }
        result
    }

    async fn record_asset(pool: &DbPool, actor: &Actor, task: &Task, url: &str) -> Result<TaskAsset> {
        let tx = pool.begin().await?;
        let asset = TaskAsset::create(&tx, task.id, url, actor.id).await?;
        Dispatcher::apply(&tx, plan_asset_added(actor.id, task.id, url)).await?;
        tx.commit().await?;
        Ok(asset)
    }

    pub async fn activities(
        &self,
        pool: &DbPool,
        actor: &Actor,
        task: &Task,
        filter: &ActivityFilter,
        page: Page,
    ) -> Result<Paginated<TaskActivity>> {
        let ctx = self.context(pool, actor, task).await?;
        authorize(
            actor,
            Action::Read,
            &Resource::Activity {
                project: ctx.project_facts,
                task: ctx.task_facts,
            },
        )?;
        Ok(TaskActivity::list_for_task(pool, task.id, filter, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use db::{
        models::{notification::Notification, sprint::CreateSprint},
        types::{ActivityType, NotificationType, Role, TaskStatus},
    };
    use policy::DenyReason;
    use serde_json::json;

    use super::*;
    use crate::services::test_db::{TestDb, actor, project_payload};

    fn new_task(project_id: i64, title: &str) -> CreateTask {
        CreateTask {
            project_id,
            sprint_id: None,
            title: title.to_string(),
            date: None,
            priority: None,
            status: None,
            assigned_to: None,
        }
    }

    async fn activity_kinds(pool: &DbPool, task_id: i64) -> Vec<ActivityType> {
        TaskActivity::latest_for_task(pool, task_id, 50)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.kind)
            .collect()
    }

    #[tokio::test]
    async fn create_with_assignee_writes_activity_and_notification() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let dev = t.user("Dev", Role::Member).await;
        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();

        let task = TaskService::new()
            .create(
                &t.db,
                &actor(&pm),
                CreateTask {
                    assigned_to: Some(dev.id),
                    ..new_task(project.id, "Login form")
                },
            )
            .await
            .unwrap();
        assert_eq!(task.task.status, TaskStatus::ToDo);
        assert_eq!(task.assignee.as_ref().map(|u| u.id), Some(dev.id));

        assert_eq!(activity_kinds(&t.db, task.task.id).await, vec![ActivityType::Created]);
        let feed = Notification::list_for_user(&t.db, dev.id, Page::default()).await.unwrap();
        assert_eq!(feed.total, 1);
        assert_eq!(feed.data[0].notification.kind, NotificationType::TaskAssigned);
    }

    #[tokio::test]
    async fn sprint_must_belong_to_task_project() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let p1 = Project::create(&t.db, &project_payload("One"), pm.id).await.unwrap();
        let p2 = Project::create(&t.db, &project_payload("Two"), pm.id).await.unwrap();
        let sprint = Sprint::create(
            &t.db,
            p2.id,
            &CreateSprint {
                name: "S".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
                status: None,
            },
        )
        .await
        .unwrap();

        let err = TaskService::new()
            .create(
                &t.db,
                &actor(&pm),
                CreateTask {
                    sprint_id: Some(sprint.id),
                    ..new_task(p1.id, "Misplaced")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(msg) if msg == "Sprint does not belong to this project."
        ));
        assert!(Task::find_by_project(&t.db, p1.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_by_assignee_notifies_assignee_and_manager() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let dev = t.user("Dev", Role::Member).await;
        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();
        let service = TaskService::new();
        let created = service
            .create(
                &t.db,
                &actor(&pm),
                CreateTask {
                    assigned_to: Some(dev.id),
                    ..new_task(project.id, "Ship")
                },
            )
            .await
            .unwrap()
            .task;
        Notification::mark_all_read(&t.db, dev.id).await.unwrap();

        let updated = service
            .update(
                &t.db,
                &actor(&dev),
                &created,
                UpdateTask {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.task.status, TaskStatus::Completed);

        let latest = TaskActivity::latest_for_task(&t.db, created.id, 1).await.unwrap();
        assert_eq!(latest[0].kind, ActivityType::StatusChanged);
        assert_eq!(
            latest[0].metadata,
            Some(json!({ "old_status": "TO_DO", "new_status": "COMPLETED" }))
        );
        assert_eq!(Notification::unread_count(&t.db, dev.id).await.unwrap(), 1);
        let manager_feed = Notification::list_for_user(&t.db, pm.id, Page::default()).await.unwrap();
        assert_eq!(manager_feed.total, 1);
        assert_eq!(manager_feed.data[0].notification.title, "Task Completed");
    }

    #[tokio::test]
    async fn failed_side_effects_roll_back_the_update() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let dev = t.user("Dev", Role::Member).await;
        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();
        let service = TaskService::new();
        let created = service
            .create(
                &t.db,
                &actor(&pm),
                CreateTask {
                    assigned_to: Some(dev.id),
                    ..new_task(project.id, "Ship")
                },
            )
            .await
            .unwrap()
            .task;
        t.db.execute_unprepared(
            "CREATE TRIGGER reject_notifications BEFORE INSERT ON notifications \
             BEGIN SELECT RAISE(ABORT, 'notifications unavailable'); END",
        )
        .await
        .unwrap();

        let err = service
            .update(
                &t.db,
                &actor(&dev),
                &created,
                UpdateTask {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Database(_)));

        let stored = Task::find_by_id(&t.db, created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::ToDo);
        assert_eq!(activity_kinds(&t.db, created.id).await, vec![ActivityType::Created]);
        assert_eq!(Notification::unread_count(&t.db, pm.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unassigning_logs_without_notifying() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let dev = t.user("Dev", Role::Member).await;
        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();
        let service = TaskService::new();
        let created = service
            .create(
                &t.db,
                &actor(&pm),
                CreateTask {
                    assigned_to: Some(dev.id),
                    ..new_task(project.id, "Ship")
                },
            )
            .await
            .unwrap()
            .task;

        let updated = service
            .update(
                &t.db,
                &actor(&pm),
                &created,
                UpdateTask {
                    assigned_to: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.task.assigned_to.is_none());

        let latest = TaskActivity::latest_for_task(&t.db, created.id, 1).await.unwrap();
        assert_eq!(latest[0].kind, ActivityType::Assigned);
        assert_eq!(latest[0].content.as_deref(), Some("Task unassigned"));
        // Only the original assignment notification exists.
        assert_eq!(Notification::unread_count(&t.db, dev.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn outsiders_are_denied_and_assignees_cannot_delete() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let dev = t.user("Dev", Role::Member).await;
        let outsider = t.user("Otto", Role::Member).await;
        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();
        let service = TaskService::new();
        let created = service
            .create(
                &t.db,
                &actor(&pm),
                CreateTask {
                    assigned_to: Some(dev.id),
                    ..new_task(project.id, "Ship")
                },
            )
            .await
            .unwrap()
            .task;

        let err = service
            .get(&t.db, &actor(&outsider), created.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(DenyReason::NotMember)));

        // Assignment alone grants read access.
        assert!(service.get(&t.db, &actor(&dev), created.clone()).await.is_ok());
        let err = service.delete(&t.db, &actor(&dev), &created).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let visible = service
            .list(&t.db, &actor(&outsider), &TaskFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(visible.total, 0);
        let visible = service
            .list(&t.db, &actor(&dev), &TaskFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(visible.total, 1);
    }

    #[tokio::test]
    async fn upload_asset_stores_file_and_logs_activity() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();
        let service = TaskService::new();
        let created = service
            .create(&t.db, &actor(&pm), new_task(project.id, "Design"))
            .await
            .unwrap()
            .task;

        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 1024);
        let asset = service
            .upload_asset(
                &t.db,
                &store,
                &actor(&pm),
                &created,
                ImageUpload {
                    bytes: b"fake-png".to_vec(),
                    content_type: Some("image/png".to_string()),
                    file_name: Some("mock.png".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(asset.image_url.starts_with("/storage/task-assets/"));

        let latest = TaskActivity::latest_for_task(&t.db, created.id, 1).await.unwrap();
        assert_eq!(latest[0].kind, ActivityType::AssetAdded);
        assert_eq!(latest[0].metadata, Some(json!({ "asset_url": asset.image_url })));

        let err = service
            .upload_asset(
                &t.db,
                &store,
                &actor(&pm),
                &created,
                ImageUpload {
                    bytes: vec![0; 2048],
                    content_type: Some("image/png".to_string()),
                    file_name: Some("huge.png".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Image(_)));
    }
}
