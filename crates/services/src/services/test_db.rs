use db::{
    DBService, DbPool,
    models::{
        project::CreateProject,
        user::{CreateUser, User},
    },
    types::Role,
};
use policy::Actor;

pub(crate) struct TestDb {
    pub db: DbPool,
}

impl TestDb {
    pub async fn new() -> Self {
        let service = DBService::new("sqlite::memory:").await.unwrap();
        Self { db: service.pool }
    }

    pub async fn user(&self, full_name: &str, role: Role) -> User {
        let email = format!(
            "{}@example.com",
            full_name.to_lowercase().replace(' ', ".")
        );
        User::create(
            &self.db,
            &CreateUser {
                full_name: full_name.to_string(),
                title: None,
                email,
                password_hash: "not-a-real-hash".to_string(),
                role,
            },
        )
        .await
        .unwrap()
    }
}

pub(crate) fn actor(user: &User) -> Actor {
    Actor::new(user.id, user.role)
}

pub(crate) fn project_payload(name: &str) -> CreateProject {
    CreateProject {
        name: name.to_string(),
        description: None,
        status: None,
        start_date: None,
        end_date: None,
        member_ids: None,
    }
}
