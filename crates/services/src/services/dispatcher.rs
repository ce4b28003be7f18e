//! Activity and notification side effects of hierarchy mutations.
//!
//! Planning is pure: each `plan_*` function compares the before and after
//! state of a mutation and returns the rows to write. [`Dispatcher::apply`]
//! then writes them on the caller's connection, which is always the
//! transaction that performed the mutation.

use db::{
    ConnectionTrait, DbErr,
    models::{
        notification::{CreateNotification, Notification},
        project::Project,
        sub_task::SubTask,
        task::Task,
        task_activity::{CreateTaskActivity, TaskActivity},
    },
    types::{ActivityType, NotificationType, TaskStatus},
};
use serde_json::json;

#[derive(Debug, Clone, Default)]
pub struct SideEffects {
    pub activities: Vec<CreateTaskActivity>,
    pub notifications: Vec<CreateNotification>,
}

impl SideEffects {
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.notifications.is_empty()
    }

    pub fn extend(&mut self, other: SideEffects) {
        self.activities.extend(other.activities);
        self.notifications.extend(other.notifications);
    }
}

/// Who a task update was made by and what it touched.
#[derive(Debug, Clone, Copy)]
pub struct TaskChange<'a> {
    pub actor_id: i64,
    pub before: &'a Task,
    pub after: &'a Task,
    pub manager_id: i64,
    /// Display name of `after.assigned_to`, when there is one.
    pub new_assignee_name: Option<&'a str>,
}

fn assignment_notification(task: &Task, user_id: i64) -> CreateNotification {
    CreateNotification {
        user_id,
        title: "New Task Assigned".to_string(),
        message: Some(format!("You have been assigned to task: {}", task.title)),
        kind: NotificationType::TaskAssigned,
        related_task_id: Some(task.id),
        related_project_id: Some(task.project_id),
    }
}

pub fn plan_task_created(actor_id: i64, task: &Task) -> SideEffects {
    let mut effects = SideEffects::default();
    effects.activities.push(CreateTaskActivity {
        task_id: task.id,
        user_id: actor_id,
        kind: ActivityType::Created,
        content: Some(format!("Task created: {}", task.title)),
        metadata: None,
    });
    if let Some(assignee) = task.assigned_to {
        effects
            .notifications
            .push(assignment_notification(task, assignee));
    }
    effects
}

pub fn plan_task_updated(change: TaskChange<'_>) -> SideEffects {
    let TaskChange {
        actor_id,
        before,
        after,
        manager_id,
        new_assignee_name,
    } = change;
    let mut effects = SideEffects::default();

    if before.status != after.status {
        effects.activities.push(CreateTaskActivity {
            task_id: after.id,
            user_id: actor_id,
            kind: ActivityType::StatusChanged,
            content: Some(format!(
                "Status changed from {} to {}",
                before.status, after.status
            )),
            metadata: Some(json!({
                "old_status": before.status,
                "new_status": after.status,
            })),
        });

        if let Some(assignee) = after.assigned_to {
            effects.notifications.push(CreateNotification {
                user_id: assignee,
                title: "Task Status Updated".to_string(),
                message: Some(format!(
                    "Task '{}' status changed from {} to {}",
                    after.title, before.status, after.status
                )),
                kind: NotificationType::StatusChanged,
                related_task_id: Some(after.id),
                related_project_id: Some(after.project_id),
            });
        }

        if after.status == TaskStatus::Completed {
            effects.notifications.push(CreateNotification {
                user_id: manager_id,
                title: "Task Completed".to_string(),
                message: Some(format!("Task '{}' has been completed", after.title)),
                kind: NotificationType::StatusChanged,
                related_task_id: Some(after.id),
                related_project_id: Some(after.project_id),
            });
        }
    }

    if before.assigned_to != after.assigned_to {
        let content = match (after.assigned_to, new_assignee_name) {
            (Some(_), Some(name)) => format!("Task assigned to {name}"),
            (Some(id), None) => format!("Task assigned to user #{id}"),
            (None, _) => "Task unassigned".to_string(),
        };
        effects.activities.push(CreateTaskActivity {
            task_id: after.id,
            user_id: actor_id,
            kind: ActivityType::Assigned,
            content: Some(content),
            metadata: Some(json!({
                "old_assignee": before.assigned_to,
                "new_assignee": after.assigned_to,
            })),
        });
        if let Some(assignee) = after.assigned_to {
            effects
                .notifications
                .push(assignment_notification(after, assignee));
        }
    }

    effects
}

pub fn plan_asset_added(actor_id: i64, task_id: i64, image_url: &str) -> SideEffects {
    SideEffects {
        activities: vec![CreateTaskActivity {
            task_id,
            user_id: actor_id,
            kind: ActivityType::AssetAdded,
            content: Some(format!("Image uploaded: {image_url}")),
            metadata: Some(json!({ "asset_url": image_url })),
        }],
        notifications: Vec::new(),
    }
}

pub fn plan_subtask_created(actor_id: i64, task: &Task, sub_task: &SubTask) -> SideEffects {
    SideEffects {
        activities: vec![CreateTaskActivity {
            task_id: task.id,
            user_id: actor_id,
            kind: ActivityType::SubtaskCreated,
            content: Some(format!(
                "Subtask created: {} (task: {})",
                sub_task.title, task.title
            )),
            metadata: Some(json!({ "subtask_id": sub_task.id })),
        }],
        notifications: Vec::new(),
    }
}

/// Invitations for users newly added to a project's member list.
pub fn plan_members_added(project: &Project, added_user_ids: &[i64]) -> SideEffects {
    SideEffects {
        activities: Vec::new(),
        notifications: added_user_ids
            .iter()
            .map(|&user_id| CreateNotification {
                user_id,
                title: "Project Invitation".to_string(),
                message: Some(format!("You have been added to project: {}", project.name)),
                kind: NotificationType::Mention,
                related_task_id: None,
                related_project_id: Some(project.id),
            })
            .collect(),
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Writes the planned rows. Must run on the mutation's transaction.
    pub async fn apply<C: ConnectionTrait>(db: &C, effects: SideEffects) -> Result<(), DbErr> {
        for activity in &effects.activities {
            TaskActivity::create(db, activity).await?;
        }
        for notification in &effects.notifications {
            Notification::create(db, notification).await?;
        }
        if !effects.is_empty() {
            tracing::debug!(
                activities = effects.activities.len(),
                notifications = effects.notifications.len(),
                "Dispatched side effects"
            );
        }
        Ok(())
    }
}
