use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use super::{
    pagination::{Page, Paginated, fetch_page},
    sprint::Sprint,
    task::Task,
    user::User,
};
use crate::{
    entities::{project, project_member},
    types::{ProjectScope, ProjectStatus},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub manager_id: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project with the people attached to it, as returned by listings.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProjectWithPeople {
    #[serde(flatten)]
    pub project: Project,
    pub manager: Option<User>,
    pub members: Vec<User>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,
    pub manager: Option<User>,
    pub members: Vec<User>,
    pub sprints: Vec<Sprint>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub member_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub member_ids: Option<Vec<i64>>,
}

impl Project {
    fn from_model(model: project::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            status: model.status,
            manager_id: model.manager_id,
            start_date: model.start_date,
            end_date: model.end_date,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        scope: &ProjectScope,
        page: Page,
    ) -> Result<Paginated<Self>, DbErr> {
        let mut query = project::Entity::find();
        match scope {
            ProjectScope::Unrestricted => {}
            ProjectScope::Nothing => return Ok(Paginated::empty(page)),
            ProjectScope::Projects(ids) => {
                query = query.filter(project::Column::Id.is_in(ids.clone()));
            }
        }
        let page = fetch_page(
            db,
            query
                .order_by_desc(project::Column::CreatedAt)
                .order_by_desc(project::Column::Id),
            page,
        )
        .await?;
        Ok(page.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        manager_id: i64,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = project::ActiveModel {
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            status: Set(data.status.unwrap_or_default()),
            manager_id: Set(manager_id),
            start_date: Set(data.start_date),
            end_date: Set(data.end_date),
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
        payload: &UpdateProject,
    ) -> Result<Self, DbErr> {
        let record = project::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let mut active: project::ActiveModel = record.into();
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        if payload.start_date.is_some() {
            active.start_date = Set(payload.start_date);
        }
        if payload.end_date.is_some() {
            active.end_date = Set(payload.end_date);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Deletes the project; sprints, tasks and memberships go with it.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = project::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub async fn member_ids<C: ConnectionTrait>(db: &C, project_id: i64) -> Result<Vec<i64>, DbErr> {
        project_member::Entity::find()
            .select_only()
            .column(project_member::Column::UserId)
            .filter(project_member::Column::ProjectId.eq(project_id))
            .order_by_asc(project_member::Column::UserId)
            .into_tuple()
            .all(db)
            .await
    }

    pub async fn is_member<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        user_id: i64,
    ) -> Result<bool, DbErr> {
        let record = project_member::Entity::find_by_id((project_id, user_id))
            .one(db)
            .await?;
        Ok(record.is_some())
    }

    /// Ids of every project the user is a member or the manager of.
    pub async fn ids_for_user<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<Vec<i64>, DbErr> {
        let member_of: Vec<i64> = project_member::Entity::find()
            .select_only()
            .column(project_member::Column::ProjectId)
            .filter(project_member::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;
        let managed: Vec<i64> = project::Entity::find()
            .select_only()
            .column(project::Column::Id)
            .filter(project::Column::ManagerId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;

        let ids: BTreeSet<i64> = member_of.into_iter().chain(managed).collect();
        Ok(ids.into_iter().collect())
    }

    /// Attaches users that are not yet members and returns the ones added.
    pub async fn add_members<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<i64>, DbErr> {
        let existing: BTreeSet<i64> = Self::member_ids(db, project_id).await?.into_iter().collect();
        let mut added = Vec::new();
        let now = Utc::now();
        for user_id in user_ids.iter().copied().collect::<BTreeSet<_>>() {
            if existing.contains(&user_id) {
                continue;
            }
            project_member::ActiveModel {
                project_id: Set(project_id),
                user_id: Set(user_id),
                joined_at: Set(now.into()),
            }
            .insert(db)
            .await?;
            added.push(user_id);
        }
        Ok(added)
    }

    /// Makes the member list exactly `user_ids`; returns the newly added ids.
    pub async fn sync_members<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<i64>, DbErr> {
        let keep: BTreeSet<i64> = user_ids.iter().copied().collect();
        let mut removal = Condition::all().add(project_member::Column::ProjectId.eq(project_id));
        if !keep.is_empty() {
            removal = removal.add(project_member::Column::UserId.is_not_in(keep.iter().copied()));
        }
        project_member::Entity::delete_many()
            .filter(removal)
            .exec(db)
            .await?;
        Self::add_members(db, project_id, user_ids).await
    }

    pub async fn with_people<C: ConnectionTrait>(
        db: &C,
        projects: Vec<Self>,
    ) -> Result<Vec<ProjectWithPeople>, DbErr> {
        let project_ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
        let memberships: Vec<(i64, i64)> = if project_ids.is_empty() {
            Vec::new()
        } else {
            project_member::Entity::find()
                .select_only()
                .column(project_member::Column::ProjectId)
                .column(project_member::Column::UserId)
                .filter(project_member::Column::ProjectId.is_in(project_ids))
                .into_tuple()
                .all(db)
                .await?
        };

        let user_ids: Vec<i64> = memberships
            .iter()
            .map(|(_, user_id)| *user_id)
            .chain(projects.iter().map(|p| p.manager_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let users: HashMap<i64, User> = User::find_by_ids(db, &user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        Ok(projects
            .into_iter()
            .map(|project| {
                let mut members: Vec<User> = memberships
                    .iter()
                    .filter(|(project_id, _)| *project_id == project.id)
                    .filter_map(|(_, user_id)| users.get(user_id).cloned())
                    .collect();
                members.sort_by(|a, b| a.full_name.cmp(&b.full_name));
                ProjectWithPeople {
                    manager: users.get(&project.manager_id).cloned(),
                    members,
                    project,
                }
            })
            .collect())
    }

    pub async fn details<C: ConnectionTrait>(db: &C, project: Self) -> Result<ProjectDetails, DbErr> {
        let sprints = Sprint::find_by_project(db, project.id).await?;
        let tasks = Task::find_by_project(db, project.id).await?;
        let ProjectWithPeople {
            project,
            manager,
            members,
        } = Self::with_people(db, vec![project])
            .await?
            .pop()
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        Ok(ProjectDetails {
            project,
            manager,
            members,
            sprints,
            tasks,
        })
    }
}
