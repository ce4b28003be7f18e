//! Resolves which projects, tasks and users an actor can see.

use db::{
    ConnectionTrait, DbErr,
    models::{
        pagination::{Page, Paginated},
        project::Project,
        task::Task,
        user::{User, UserFilter},
    },
    types::{ProjectScope, TaskScope},
};
use policy::{Action, Actor, ProjectFacts, Resource, TaskFacts, decide, visibility};

use super::error::ServiceError;

pub async fn project_scope<C: ConnectionTrait>(db: &C, actor: &Actor) -> Result<ProjectScope, DbErr> {
    if actor.is_pm() {
        return Ok(ProjectScope::Unrestricted);
    }
    let own = Project::ids_for_user(db, actor.id).await?;
    Ok(visibility::project_scope(actor, own))
}

pub async fn task_scope<C: ConnectionTrait>(db: &C, actor: &Actor) -> Result<TaskScope, DbErr> {
    if actor.is_pm() {
        return Ok(TaskScope::Unrestricted);
    }
    let own = Project::ids_for_user(db, actor.id).await?;
    Ok(visibility::task_scope(actor, own))
}

/// Users sharing a visible project with the actor; everyone for a PM.
pub async fn list_members<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    filter: &UserFilter,
    page: Page,
) -> Result<Paginated<User>, DbErr> {
    let scope = project_scope(db, actor).await?;
    User::list(db, &scope, filter, page).await
}

pub async fn project_facts<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    project: &Project,
) -> Result<ProjectFacts, DbErr> {
    Ok(ProjectFacts {
        manager_id: project.manager_id,
        is_member: Project::is_member(db, project.id, actor.id).await?,
    })
}

pub fn task_facts(task: &Task) -> TaskFacts {
    TaskFacts {
        created_by: task.created_by,
        assigned_to: task.assigned_to,
    }
}

/// Runs the policy decision and turns a denial into a service error.
pub fn authorize(actor: &Actor, action: Action, resource: &Resource) -> Result<(), ServiceError> {
    decide(actor, action, resource).into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use db::types::Role;

    use super::*;
    use crate::services::test_db::{TestDb, actor, project_payload};

    #[tokio::test]
    async fn member_without_projects_sees_nothing() {
        let t = TestDb::new().await;
        let loner = t.user("Lone Member", Role::Member).await;
        let loner = actor(&loner);

        assert_eq!(project_scope(&t.db, &loner).await.unwrap(), ProjectScope::Nothing);
        let members = list_members(&t.db, &loner, &UserFilter::default(), Page::default())
            .await
            .unwrap();
        assert!(members.data.is_empty());
        assert_eq!(members.total, 0);
    }

    #[tokio::test]
    async fn member_sees_co_members_and_manager() {
        let t = TestDb::new().await;
        let pm = t.user("Pat Manager", Role::Pm).await;
        let alice = t.user("Alice", Role::Member).await;
        let bob = t.user("Bob", Role::Member).await;
        let outsider = t.user("Zed Outsider", Role::Member).await;

        let project = Project::create(&t.db, &project_payload("Apollo"), pm.id).await.unwrap();
        Project::add_members(&t.db, project.id, &[alice.id, bob.id]).await.unwrap();
        Project::create(&t.db, &project_payload("Other"), pm.id)
            .await
            .unwrap();

        let page = list_members(&t.db, &actor(&alice), &UserFilter::default(), Page::default())
            .await
            .unwrap();
        let names: Vec<_> = page.data.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Pat Manager"]);
        assert!(!page.data.iter().any(|u| u.id == outsider.id));

        let everyone = list_members(&t.db, &actor(&pm), &UserFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(everyone.total, 4);
    }
}
