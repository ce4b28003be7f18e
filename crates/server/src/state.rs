use std::sync::Arc;

use db::{DBService, DbErr, DbPool};
use services::services::{
    auth::AuthService,
    config::{Config, ConfigError},
    image::ImageStore,
    notification::NotificationService,
    project::ProjectService,
    sprint::SprintService,
    sub_task::SubTaskService,
    task::TaskService,
};
use thiserror::Error;
use utils_jwt::TokenSigner;

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared handles for every request: the pool, immutable config and the
/// domain services.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    auth: AuthService,
    images: ImageStore,
    projects: ProjectService,
    sprints: SprintService,
    tasks: TaskService,
    sub_tasks: SubTaskService,
    notifications: NotificationService,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, StateError> {
        let db = DBService::new(&config.database_url()?).await?;
        let upload_dir = config.upload_dir()?;
        tokio::fs::create_dir_all(&upload_dir).await?;

        let signer = TokenSigner::new(
            &config.jwt_secret,
            chrono::Duration::seconds(config.access_token_ttl_secs),
        );
        Ok(Self {
            db,
            auth: AuthService::new(signer),
            images: ImageStore::new(upload_dir, config.max_upload_bytes),
            config: Arc::new(config),
            projects: ProjectService::new(),
            sprints: SprintService::new(),
            tasks: TaskService::new(),
            sub_tasks: SubTaskService::new(),
            notifications: NotificationService::new(),
        })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn pool(&self) -> &DbPool {
        &self.db.pool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    pub fn sprints(&self) -> &SprintService {
        &self.sprints
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn sub_tasks(&self) -> &SubTaskService {
        &self.sub_tasks
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Public base URL used in generated API documents.
    pub fn public_url(&self) -> String {
        format!("http://{}:{}", self.config.host, self.config.port)
    }
}
