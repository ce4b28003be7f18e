use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use super::pagination::{Page, Paginated, fetch_page};
use crate::{
    entities::{project, project_member, user},
    types::{ProjectScope, Role},
};

const LIKE_ESCAPE: char = '\\';

/// LIKE pattern matching `needle` literally anywhere in the column.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub title: Option<String>,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub full_name: String,
    pub title: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl User {
    fn from_model(model: user::Model) -> Self {
        Self {
            id: model.id,
            full_name: model.full_name,
            title: model.title,
            email: model.email,
            role: model.role,
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub fn is_pm(&self) -> bool {
        self.role == Role::Pm
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
    ) -> Result<Vec<Self>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(user::Column::FullName)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn email_exists<C: ConnectionTrait>(db: &C, email: &str) -> Result<bool, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(record.is_some())
    }

    /// Returns the user together with the stored password hash.
    pub async fn find_credentials<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<(Self, String)>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(record.map(|model| {
            let hash = model.password_hash.clone();
            (Self::from_model(model), hash)
        }))
    }

    pub async fn find_by_refresh_token_hash<C: ConnectionTrait>(
        db: &C,
        hash: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::RefreshTokenHash.eq(hash))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateUser) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = user::ActiveModel {
            full_name: Set(data.full_name.clone()),
            title: Set(data.title.clone()),
            email: Set(data.email.clone()),
            password_hash: Set(data.password_hash.clone()),
            role: Set(data.role),
            is_active: Set(true),
            refresh_token_hash: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn set_refresh_token_hash<C: ConnectionTrait>(
        db: &C,
        id: i64,
        hash: Option<String>,
    ) -> Result<(), DbErr> {
        let record = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        let mut active: user::ActiveModel = record.into();
        active.refresh_token_hash = Set(hash);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    pub async fn set_active<C: ConnectionTrait>(
        db: &C,
        id: i64,
        is_active: bool,
    ) -> Result<Self, DbErr> {
        let record = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        let mut active: user::ActiveModel = record.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Lists users who share a project in `scope`, ordered by name.
    pub async fn list<C: ConnectionTrait>(
        db: &C,
        scope: &ProjectScope,
        filter: &UserFilter,
        page: Page,
    ) -> Result<Paginated<Self>, DbErr> {
        let mut query = user::Entity::find();

        match scope {
            ProjectScope::Unrestricted => {}
            ProjectScope::Nothing => return Ok(Paginated::empty(page)),
            ProjectScope::Projects(ids) => {
                let members = Query::select()
                    .column(project_member::Column::UserId)
                    .from(project_member::Entity)
                    .and_where(project_member::Column::ProjectId.is_in(ids.clone()))
                    .to_owned();
                let managers = Query::select()
                    .column(project::Column::ManagerId)
                    .from(project::Entity)
                    .and_where(project::Column::Id.is_in(ids.clone()))
                    .to_owned();
                query = query.filter(
                    Condition::any()
                        .add(user::Column::Id.in_subquery(members))
                        .add(user::Column::Id.in_subquery(managers)),
                );
            }
        }

        if let Some(role) = filter.role {
            query = query.filter(user::Column::Role.eq(role));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(user::Column::IsActive.eq(is_active));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = contains_pattern(&search.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::FullName)))
                            .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE)),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::Email)))
                            .like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)),
                    ),
            );
        }

        let page = fetch_page(
            db,
            query
                .order_by_asc(user::Column::FullName)
                .order_by_asc(user::Column::Id),
            page,
        )
        .await?;
        Ok(page.map(Self::from_model))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn new_user(name: &str, email: &str, role: Role) -> CreateUser {
        CreateUser {
            full_name: name.to_string(),
            title: None,
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn create_and_lookup_by_email() {
        let db = setup_db().await;
        let created = User::create(&db, &new_user("Ada", "ada@example.com", Role::Pm))
            .await
            .unwrap();
        assert!(created.is_active);
        assert!(created.is_pm());
        assert!(User::email_exists(&db, "ada@example.com").await.unwrap());

        let (found, hash) = User::find_credentials(&db, "ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(hash, "hash");
    }

    #[tokio::test]
    async fn list_filters_and_scopes() {
        let db = setup_db().await;
        User::create(&db, &new_user("Zed", "zed@example.com", Role::Member))
            .await
            .unwrap();
        let bob = User::create(&db, &new_user("Bob", "BOB@corp.io", Role::Member))
            .await
            .unwrap();
        User::set_active(&db, bob.id, false).await.unwrap();
        User::create(&db, &new_user("Alice", "alice@example.com", Role::Pm))
            .await
            .unwrap();

        let all = User::list(&db, &ProjectScope::Unrestricted, &UserFilter::default(), Page::default())
            .await
            .unwrap();
        let names: Vec<_> = all.data.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Zed"]);

        let search = UserFilter {
            search: Some("bob@CORP".to_string()),
            ..Default::default()
        };
        let found = User::list(&db, &ProjectScope::Unrestricted, &search, Page::default())
            .await
            .unwrap();
        assert_eq!(found.total, 1);

        let active_members = UserFilter {
            role: Some(Role::Member),
            is_active: Some(true),
            ..Default::default()
        };
        let found = User::list(&db, &ProjectScope::Unrestricted, &active_members, Page::default())
            .await
            .unwrap();
        assert_eq!(found.data.len(), 1);
        assert_eq!(found.data[0].full_name, "Zed");

        User::create(&db, &new_user("Una", "u_na@example.com", Role::Member))
            .await
            .unwrap();
        let underscore = UserFilter {
            search: Some("_".to_string()),
            ..Default::default()
        };
        let found = User::list(&db, &ProjectScope::Unrestricted, &underscore, Page::default())
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.data[0].full_name, "Una");
        let percent = UserFilter {
            search: Some("%".to_string()),
            ..Default::default()
        };
        let found = User::list(&db, &ProjectScope::Unrestricted, &percent, Page::default())
            .await
            .unwrap();
        assert_eq!(found.total, 0);

        let none = User::list(&db, &ProjectScope::Nothing, &UserFilter::default(), Page::default())
            .await
            .unwrap();
        assert!(none.data.is_empty());
        assert_eq!(none.total, 0);
    }

    #[test]
    fn search_wildcards_are_escaped() {
        assert_eq!(contains_pattern("ada"), "%ada%");
        assert_eq!(contains_pattern("a_b%c"), "%a\\_b\\%c%");
        assert_eq!(contains_pattern("x\\y"), "%x\\\\y%");
    }
}
