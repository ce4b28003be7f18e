use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Users::Table)
                    .col(pk_id_col(manager, Users::Id))
                    .col(ColumnDef::new(Users::FullName).string().not_null())
                    .col(ColumnDef::new(Users::Title).string())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("MEMBER")),
                    )
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(ColumnDef::new(Users::RefreshTokenHash).string_len(64))
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_refresh_token_hash")
                    .table(Users::Table)
                    .col(Users::RefreshTokenHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Projects::Table)
                    .col(pk_id_col(manager, Projects::Id))
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("active")),
                    )
                    .col(fk_id_col(manager, Projects::ManagerId))
                    .col(ColumnDef::new(Projects::StartDate).date())
                    .col(ColumnDef::new(Projects::EndDate).date())
                    .col(timestamp_col(Projects::CreatedAt))
                    .col(timestamp_col(Projects::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_manager_id")
                            .from(Projects::Table, Projects::ManagerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_projects_manager_id")
                    .table(Projects::Table)
                    .col(Projects::ManagerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(ProjectMembers::Table)
                    .col(fk_id_col(manager, ProjectMembers::ProjectId))
                    .col(fk_id_col(manager, ProjectMembers::UserId))
                    .col(timestamp_col(ProjectMembers::JoinedAt))
                    .primary_key(
                        Index::create()
                            .col(ProjectMembers::ProjectId)
                            .col(ProjectMembers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_members_project_id")
                            .from(ProjectMembers::Table, ProjectMembers::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_members_user_id")
                            .from(ProjectMembers::Table, ProjectMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_project_members_user_id")
                    .table(ProjectMembers::Table)
                    .col(ProjectMembers::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Sprints::Table)
                    .col(pk_id_col(manager, Sprints::Id))
                    .col(fk_id_col(manager, Sprints::ProjectId))
                    .col(ColumnDef::new(Sprints::Name).string().not_null())
                    .col(ColumnDef::new(Sprints::StartDate).date().not_null())
                    .col(ColumnDef::new(Sprints::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(Sprints::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("planned")),
                    )
                    .col(timestamp_col(Sprints::CreatedAt))
                    .col(timestamp_col(Sprints::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sprints_project_id")
                            .from(Sprints::Table, Sprints::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sprints_project_id")
                    .table(Sprints::Table)
                    .col(Sprints::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(fk_id_col(manager, Tasks::ProjectId))
                    .col(fk_id_nullable_col(manager, Tasks::SprintId))
                    .col(ColumnDef::new(Tasks::Title).string().not_null())
                    .col(ColumnDef::new(Tasks::Date).date())
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("MEDIUM")),
                    )
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("TO_DO")),
                    )
                    .col(fk_id_nullable_col(manager, Tasks::AssignedTo))
                    .col(fk_id_col(manager, Tasks::CreatedBy))
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_project_id")
                            .from(Tasks::Table, Tasks::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_sprint_id")
                            .from(Tasks::Table, Tasks::SprintId)
                            .to(Sprints::Table, Sprints::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_assigned_to")
                            .from(Tasks::Table, Tasks::AssignedTo)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_created_by")
                            .from(Tasks::Table, Tasks::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_tasks_project_id", Tasks::ProjectId),
            ("idx_tasks_sprint_id", Tasks::SprintId),
            ("idx_tasks_assigned_to", Tasks::AssignedTo),
            ("idx_tasks_status", Tasks::Status),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Tasks::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(SubTasks::Table)
                    .col(pk_id_col(manager, SubTasks::Id))
                    .col(fk_id_col(manager, SubTasks::TaskId))
                    .col(ColumnDef::new(SubTasks::Title).string().not_null())
                    .col(ColumnDef::new(SubTasks::Date).date())
                    .col(ColumnDef::new(SubTasks::Tag).string_len(100))
                    .col(
                        ColumnDef::new(SubTasks::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_col(SubTasks::CreatedAt))
                    .col(timestamp_col(SubTasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sub_tasks_task_id")
                            .from(SubTasks::Table, SubTasks::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sub_tasks_task_id")
                    .table(SubTasks::Table)
                    .col(SubTasks::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(TaskAssets::Table)
                    .col(pk_id_col(manager, TaskAssets::Id))
                    .col(fk_id_col(manager, TaskAssets::TaskId))
                    .col(ColumnDef::new(TaskAssets::ImageUrl).string().not_null())
                    .col(fk_id_col(manager, TaskAssets::UploadedBy))
                    .col(timestamp_col(TaskAssets::UploadedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assets_task_id")
                            .from(TaskAssets::Table, TaskAssets::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assets_uploaded_by")
                            .from(TaskAssets::Table, TaskAssets::UploadedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(TaskActivities::Table)
                    .col(pk_id_col(manager, TaskActivities::Id))
                    .col(fk_id_col(manager, TaskActivities::TaskId))
                    .col(fk_id_col(manager, TaskActivities::UserId))
                    .col(ColumnDef::new(TaskActivities::Type).string_len(32).not_null())
                    .col(ColumnDef::new(TaskActivities::Content).text())
                    .col(ColumnDef::new(TaskActivities::Metadata).json())
                    .col(timestamp_col(TaskActivities::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_activities_task_id")
                            .from(TaskActivities::Table, TaskActivities::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_activities_user_id")
                            .from(TaskActivities::Table, TaskActivities::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_task_activities_task_id_created_at")
                    .table(TaskActivities::Table)
                    .col(TaskActivities::TaskId)
                    .col(TaskActivities::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Notifications::Table)
                    .col(pk_id_col(manager, Notifications::Id))
                    .col(fk_id_col(manager, Notifications::UserId))
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).text())
                    .col(ColumnDef::new(Notifications::Type).string_len(32).not_null())
                    .col(fk_id_nullable_col(manager, Notifications::RelatedTaskId))
                    .col(fk_id_nullable_col(manager, Notifications::RelatedProjectId))
                    .col(
                        ColumnDef::new(Notifications::IsRead)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_col(Notifications::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user_id")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_related_task_id")
                            .from(Notifications::Table, Notifications::RelatedTaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_related_project_id")
                            .from(Notifications::Table, Notifications::RelatedProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_user_id_is_read")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::IsRead)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskActivities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskAssets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SubTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sprints::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = fk_id_nullable_col(manager, col);
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    FullName,
    Title,
    Email,
    PasswordHash,
    Role,
    IsActive,
    RefreshTokenHash,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Name,
    Description,
    Status,
    ManagerId,
    StartDate,
    EndDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ProjectMembers {
    Table,
    ProjectId,
    UserId,
    JoinedAt,
}

#[derive(Iden)]
enum Sprints {
    Table,
    Id,
    ProjectId,
    Name,
    StartDate,
    EndDate,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
enum Tasks {
    Table,
    Id,
    ProjectId,
    SprintId,
    Title,
    Date,
    Priority,
    Status,
    AssignedTo,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum SubTasks {
    Table,
    Id,
    TaskId,
    Title,
    Date,
    Tag,
    IsCompleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TaskAssets {
    Table,
    Id,
    TaskId,
    ImageUrl,
    UploadedBy,
    UploadedAt,
}

#[derive(Iden)]
enum TaskActivities {
    Table,
    Id,
    TaskId,
    UserId,
    Type,
    Content,
    Metadata,
    CreatedAt,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Title,
    Message,
    Type,
    RelatedTaskId,
    RelatedProjectId,
    IsRead,
    CreatedAt,
}
