use db::{
    DbPool, TransactionTrait,
    models::{
        pagination::{Page, Paginated},
        project::{CreateProject, Project, ProjectDetails, ProjectWithPeople, UpdateProject},
    },
};
use policy::{Action, Actor, Resource};

use super::{
    dispatcher::{Dispatcher, plan_members_added},
    error::{Result, ServiceError, require_date_range, require_text, require_users},
    visibility::{self, authorize},
};

const NAME_MAX_LEN: usize = 255;

#[derive(Clone, Default)]
pub struct ProjectService;

impl ProjectService {
    pub fn new() -> Self {
        Self
    }

    pub async fn list(
        &self,
        pool: &DbPool,
        actor: &Actor,
        page: Page,
    ) -> Result<Paginated<ProjectWithPeople>> {
        let scope = visibility::project_scope(pool, actor).await?;
        let projects = Project::list(pool, &scope, page).await?;
        let Paginated {
            data,
            current_page,
            per_page,
            total,
            last_page,
        } = projects;
        Ok(Paginated {
            data: Project::with_people(pool, data).await?,
            current_page,
            per_page,
            total,
            last_page,
        })
    }

    pub async fn get(&self, pool: &DbPool, actor: &Actor, project: Project) -> Result<ProjectDetails> {
        let facts = visibility::project_facts(pool, actor, &project).await?;
        authorize(actor, Action::Read, &Resource::Project(facts))?;
        Ok(Project::details(pool, project).await?)
    }

    /// Creates a project managed by `actor` and invites the listed members.
    pub async fn create(
        &self,
        pool: &DbPool,
        actor: &Actor,
        payload: CreateProject,
    ) -> Result<ProjectDetails> {
        authorize(actor, Action::Create, &Resource::ProjectCollection)?;
        require_text("name", &payload.name, NAME_MAX_LEN)?;
        require_date_range(payload.start_date, payload.end_date)?;
        if let Some(member_ids) = &payload.member_ids {
            require_users(pool, "member_ids", member_ids).await?;
        }

        let tx = pool.begin().await?;
        let project = Project::create(&tx, &payload, actor.id).await?;
        if let Some(member_ids) = &payload.member_ids {
            let added = Project::add_members(&tx, project.id, member_ids).await?;
            Dispatcher::apply(&tx, plan_members_added(&project, &added)).await?;
        }
        tx.commit().await?;

        tracing::info!(project_id = project.id, manager_id = actor.id, "Project created");
        Ok(Project::details(pool, project).await?)
    }

    /// Applies a partial update. A `member_ids` list replaces the member set,
    /// and only users who were not members before are invited.
    pub async fn update(
        &self,
        pool: &DbPool,
        actor: &Actor,
        project: &Project,
        payload: UpdateProject,
    ) -> Result<ProjectWithPeople> {
        let facts = visibility::project_facts(pool, actor, project).await?;
        authorize(actor, Action::Update, &Resource::Project(facts))?;
        if let Some(name) = &payload.name {
            require_text("name", name, NAME_MAX_LEN)?;
        }
        require_date_range(
            payload.start_date.or(project.start_date),
            payload.end_date.or(project.end_date),
        )?;
        if let Some(member_ids) = &payload.member_ids {
            require_users(pool, "member_ids", member_ids).await?;
        }

        let tx = pool.begin().await?;
        let updated = Project::update(&tx, project.id, &payload).await?;
        if let Some(member_ids) = &payload.member_ids {
            let added = Project::sync_members(&tx, project.id, member_ids).await?;
            Dispatcher::apply(&tx, plan_members_added(&updated, &added)).await?;
        }
        tx.commit().await?;

        Project::with_people(pool, vec![updated])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("Project"))
    }

    pub async fn delete(&self, pool: &DbPool, actor: &Actor, project: &Project) -> Result<()> {
        let facts = visibility::project_facts(pool, actor, project).await?;
        authorize(actor, Action::Delete, &Resource::Project(facts))?;
        let rows = Project::delete(pool, project.id).await?;
        if rows == 0 {
            return Err(ServiceError::NotFound("Project"));
        }
        tracing::info!(project_id = project.id, actor_id = actor.id, "Project deleted");
        Ok(())
    }
}
