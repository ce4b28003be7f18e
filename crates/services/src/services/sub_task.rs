use db::{
    DbPool, TransactionTrait,
    models::{
        sub_task::{CreateSubTask, SubTask, UpdateSubTask},
        task::Task,
    },
};
use policy::{Action, Actor, Resource};

use super::{
    dispatcher::{Dispatcher, plan_subtask_created},
    error::{Result, ServiceError, require_text},
    visibility::{self, authorize},
};

const TITLE_MAX_LEN: usize = 255;
const TAG_MAX_LEN: usize = 100;

fn validate_tag(tag: Option<&str>) -> Result<()> {
    match tag {
        Some(tag) if tag.chars().count() > TAG_MAX_LEN => Err(ServiceError::validation(format!(
            "The tag field must not be greater than {TAG_MAX_LEN} characters."
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone, Default)]
pub struct SubTaskService;

impl SubTaskService {
    pub fn new() -> Self {
        Self
    }

    async fn authorize_on(
        &self,
        pool: &DbPool,
        actor: &Actor,
        action: Action,
        task: &Task,
    ) -> Result<()> {
        let project = task.project(pool).await?;
        let resource = Resource::SubTask {
            project: visibility::project_facts(pool, actor, &project).await?,
            task: visibility::task_facts(task),
        };
        authorize(actor, action, &resource)
    }

    pub async fn list(&self, pool: &DbPool, actor: &Actor, task: &Task) -> Result<Vec<SubTask>> {
        self.authorize_on(pool, actor, Action::Read, task).await?;
        Ok(SubTask::find_by_task(pool, task.id).await?)
    }

    /// Creates a sub-task and records it in the parent task's history.
    pub async fn create(
        &self,
        pool: &DbPool,
        actor: &Actor,
        task: &Task,
        payload: CreateSubTask,
    ) -> Result<SubTask> {
        self.authorize_on(pool, actor, Action::Create, task).await?;
        require_text("title", &payload.title, TITLE_MAX_LEN)?;
        validate_tag(payload.tag.as_deref())?;

        let tx = pool.begin().await?;
        let sub_task = SubTask::create(&tx, task.id, &payload).await?;
        Dispatcher::apply(&tx, plan_subtask_created(actor.id, task, &sub_task)).await?;
        tx.commit().await?;
        Ok(sub_task)
    }

    pub async fn update(
        &self,
        pool: &DbPool,
        actor: &Actor,
        task: &Task,
        sub_task: &SubTask,
        payload: UpdateSubTask,
    ) -> Result<SubTask> {
        self.authorize_on(pool, actor, Action::Update, task).await?;
        if let Some(title) = &payload.title {
            require_text("title", title, TITLE_MAX_LEN)?;
        }
        validate_tag(payload.tag.as_deref())?;
        Ok(SubTask::update(pool, sub_task.id, &payload).await?)
    }

    pub async fn delete(
        &self,
        pool: &DbPool,
        actor: &Actor,
        task: &Task,
        sub_task: &SubTask,
    ) -> Result<()> {
        self.authorize_on(pool, actor, Action::Delete, task).await?;
        if SubTask::delete(pool, sub_task.id).await? == 0 {
            return Err(ServiceError::NotFound("SubTask"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::{
        models::{project::Project, task::CreateTask, task_activity::TaskActivity},
        types::{ActivityType, Role},
    };
    use policy::DenyReason;
    use serde_json::json;

    use super::*;
    use crate::services::test_db::{TestDb, actor, project_payload};

    fn payload(title: &str) -> CreateSubTask {
        CreateSubTask {
            title: title.to_string(),
            date: None,
            tag: Some("backend".to_string()),
            is_completed: None,
        }
    }

    #[tokio::test]
    async fn assignee_manages_sub_tasks_member_cannot() {
        let t = TestDb::new().await;
        let pm = t.user("Pat", Role::Pm).await;
        let dev = t.user("Dev", Role::Member).await;
        let member = t.user("Mia", Role::Member).await;
        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();
        Project::add_members(&t.db, project.id, &[member.id]).await.unwrap();
        let task = Task::create(
            &t.db,
            &CreateTask {
                project_id: project.id,
                sprint_id: None,
                title: "Checkout".to_string(),
                date: None,
                priority: None,
                status: None,
                assigned_to: Some(dev.id),
            },
            pm.id,
        )
        .await
        .unwrap();
        let service = SubTaskService::new();

        let sub_task = service
            .create(&t.db, &actor(&dev), &task, payload("Validate card"))
            .await
            .unwrap();
        assert!(!sub_task.is_completed);

        let history = TaskActivity::latest_for_task(&t.db, task.id, 1).await.unwrap();
        assert_eq!(history[0].kind, ActivityType::SubtaskCreated);
        assert_eq!(history[0].metadata, Some(json!({ "subtask_id": sub_task.id })));

        let err = service
            .create(&t.db, &actor(&member), &task, payload("Sneaky"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(DenyReason::NotAssigned)));
        assert_eq!(service.list(&t.db, &actor(&member), &task).await.unwrap().len(), 1);

        let done = service
            .update(
                &t.db,
                &actor(&dev),
                &task,
                &sub_task,
                UpdateSubTask {
                    is_completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(done.is_completed);

        service.delete(&t.db, &actor(&pm), &task, &sub_task).await.unwrap();
        assert!(SubTask::find_by_task(&t.db, task.id).await.unwrap().is_empty());
    }

    #[test]
    fn tag_is_limited() {
        assert!(validate_tag(Some(&"t".repeat(100))).is_ok());
        assert!(validate_tag(Some(&"t".repeat(101))).is_err());
        assert!(validate_tag(None).is_ok());
    }
}
