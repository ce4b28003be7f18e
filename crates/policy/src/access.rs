use db::types::Role;
use strum_macros::Display;
use thiserror::Error;

/// The authenticated user a decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_pm(&self) -> bool {
        self.role == Role::Pm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// What the rules need to know about a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectFacts {
    pub manager_id: i64,
    /// Whether the actor is listed in the project's members.
    pub is_member: bool,
}

/// What the rules need to know about a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFacts {
    pub created_by: i64,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The set of all projects; creating one lands here.
    ProjectCollection,
    Project(ProjectFacts),
    Sprint(ProjectFacts),
    /// The tasks of a project; creating one lands here.
    TaskCollection(ProjectFacts),
    Task {
        project: ProjectFacts,
        task: TaskFacts,
    },
    SubTask {
        project: ProjectFacts,
        task: TaskFacts,
    },
    Asset {
        project: ProjectFacts,
        task: TaskFacts,
    },
    Activity {
        project: ProjectFacts,
        task: TaskFacts,
    },
    Notification {
        owner_id: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("Only the project manager can perform this action.")]
    NotProjectManager,
    #[error("Only Project Managers can perform this action.")]
    PmRoleRequired,
    #[error("You do not have access to this project.")]
    NotMember,
    #[error("You do not have permission to modify this task.")]
    NotAssigned,
    #[error("You can only access your own notifications.")]
    NotNotificationOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

fn allow_if(condition: bool, reason: DenyReason) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(reason)
    }
}

fn is_manager(actor: &Actor, project: &ProjectFacts) -> bool {
    actor.id == project.manager_id
}

fn can_read_project(actor: &Actor, project: &ProjectFacts) -> bool {
    actor.is_pm() || project.is_member || is_manager(actor, project)
}

fn can_read_task(actor: &Actor, project: &ProjectFacts, task: &TaskFacts) -> bool {
    can_read_project(actor, project) || task.assigned_to == Some(actor.id)
}

fn can_work_on_task(actor: &Actor, project: &ProjectFacts, task: &TaskFacts) -> bool {
    actor.is_pm() || is_manager(actor, project) || task.assigned_to == Some(actor.id)
}

/// Decides whether `actor` may perform `action` on `resource`.
///
/// Pure: every fact the rules depend on travels inside `resource`.
pub fn decide(actor: &Actor, action: Action, resource: &Resource) -> Decision {
    match (resource, action) {
        (Resource::ProjectCollection, Action::Create) => {
            allow_if(actor.is_pm(), DenyReason::PmRoleRequired)
        }
        (Resource::ProjectCollection, _) => Decision::Allow,

        (Resource::Project(project) | Resource::Sprint(project), Action::Read) => {
            allow_if(can_read_project(actor, project), DenyReason::NotMember)
        }
        (Resource::Project(project) | Resource::Sprint(project), _) => {
            allow_if(is_manager(actor, project), DenyReason::NotProjectManager)
        }

        (Resource::TaskCollection(project), _) => {
            allow_if(can_read_project(actor, project), DenyReason::NotMember)
        }

        (Resource::Task { project, task }, Action::Read) => {
            allow_if(can_read_task(actor, project, task), DenyReason::NotMember)
        }
        (Resource::Task { project, .. }, Action::Create) => {
            allow_if(can_read_project(actor, project), DenyReason::NotMember)
        }
        (Resource::Task { project, task }, Action::Update) => allow_if(
            can_work_on_task(actor, project, task) || task.created_by == actor.id,
            DenyReason::NotAssigned,
        ),
        (Resource::Task { task, .. }, Action::Delete) => allow_if(
            actor.is_pm() || task.created_by == actor.id,
            DenyReason::NotAssigned,
        ),

        (
            Resource::SubTask { project, task }
            | Resource::Asset { project, task }
            | Resource::Activity { project, task },
            Action::Read,
        ) => allow_if(can_read_task(actor, project, task), DenyReason::NotMember),
        (Resource::SubTask { project, task } | Resource::Asset { project, task }, _) => allow_if(
            can_work_on_task(actor, project, task),
            DenyReason::NotAssigned,
        ),
        // Activities are only ever written by the dispatcher.
        (Resource::Activity { .. }, _) => Decision::Deny(DenyReason::NotAssigned),

        (Resource::Notification { owner_id }, _) => {
            allow_if(*owner_id == actor.id, DenyReason::NotNotificationOwner)
        }
    }
}
