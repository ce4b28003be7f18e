use db::{
    DbPool,
    models::{
        pagination::{Page, Paginated},
        project::Project,
        sprint::{CreateSprint, Sprint, SprintWithTasks, UpdateSprint},
    },
};
use policy::{Action, Actor, Resource};

use super::{
    error::{Result, ServiceError, require_date_order, require_text},
    visibility::{self, authorize},
};

const NAME_MAX_LEN: usize = 255;

#[derive(Clone, Default)]
pub struct SprintService;

impl SprintService {
    pub fn new() -> Self {
        Self
    }

    async fn authorize_on(
        &self,
        pool: &DbPool,
        actor: &Actor,
        action: Action,
        project: &Project,
    ) -> Result<()> {
        let facts = visibility::project_facts(pool, actor, project).await?;
        authorize(actor, action, &Resource::Sprint(facts))
    }

    pub async fn list(
        &self,
        pool: &DbPool,
        actor: &Actor,
        project: &Project,
        page: Page,
    ) -> Result<Paginated<SprintWithTasks>> {
        self.authorize_on(pool, actor, Action::Read, project).await?;
        let sprints = Sprint::list_for_project(pool, project.id, page).await?;
        let Paginated {
            data,
            current_page,
            per_page,
            total,
            last_page,
        } = sprints;
        let mut loaded = Vec::with_capacity(data.len());
        for sprint in data {
            loaded.push(Sprint::with_tasks(pool, sprint).await?);
        }
        Ok(Paginated {
            data: loaded,
            current_page,
            per_page,
            total,
            last_page,
        })
    }

    pub async fn get(
        &self,
        pool: &DbPool,
        actor: &Actor,
        project: &Project,
        sprint: Sprint,
    ) -> Result<SprintWithTasks> {
        self.authorize_on(pool, actor, Action::Read, project).await?;
        Ok(Sprint::with_tasks(pool, sprint).await?)
    }

    pub async fn create(
        &self,
        pool: &DbPool,
        actor: &Actor,
        project: &Project,
        payload: CreateSprint,
    ) -> Result<SprintWithTasks> {
        self.authorize_on(pool, actor, Action::Create, project).await?;
        require_text("name", &payload.name, NAME_MAX_LEN)?;
        require_date_order(Some(payload.start_date), Some(payload.end_date))?;

        let sprint = Sprint::create(pool, project.id, &payload).await?;
        tracing::debug!(sprint_id = sprint.id, project_id = project.id, "Sprint created");
        Ok(Sprint::with_tasks(pool, sprint).await?)
    }

    pub async fn update(
        &self,
        pool: &DbPool,
        actor: &Actor,
        project: &Project,
        sprint: &Sprint,
        payload: UpdateSprint,
    ) -> Result<SprintWithTasks> {
        self.authorize_on(pool, actor, Action::Update, project).await?;
        if let Some(name) = &payload.name {
            require_text("name", name, NAME_MAX_LEN)?;
        }
        require_date_order(
            Some(payload.start_date.unwrap_or(sprint.start_date)),
            Some(payload.end_date.unwrap_or(sprint.end_date)),
        )?;

        let updated = Sprint::update(pool, sprint.id, &payload).await?;
        Ok(Sprint::with_tasks(pool, updated).await?)
    }

    /// Deletes the sprint. Its tasks stay in the project backlog.
    pub async fn delete(
        &self,
        pool: &DbPool,
        actor: &Actor,
        project: &Project,
        sprint: &Sprint,
    ) -> Result<()> {
        self.authorize_on(pool, actor, Action::Delete, project).await?;
        if Sprint::delete(pool, sprint.id).await? == 0 {
            return Err(ServiceError::NotFound("Sprint"));
        }
        tracing::info!(sprint_id = sprint.id, actor_id = actor.id, "Sprint deleted");
        Ok(())
    }
}
