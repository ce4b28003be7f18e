use db::{
    DbPool,
    models::{
        notification::{Notification, NotificationWithRefs},
        pagination::{Page, Paginated},
    },
};
use policy::{Action, Actor, Resource};

use super::{
    error::{Result, ServiceError},
    visibility::authorize,
};

pub const DEFAULT_PER_PAGE: u64 = 20;

/// The per-user notification feed. Every operation is limited to the
/// recipient's own rows.
#[derive(Clone, Default)]
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    fn authorize_owner(
        &self,
        actor: &Actor,
        action: Action,
        notification: &Notification,
    ) -> Result<()> {
        authorize(
            actor,
            action,
            &Resource::Notification {
                owner_id: notification.user_id,
            },
        )
    }

    pub async fn list(
        &self,
        pool: &DbPool,
        actor: &Actor,
        page: Page,
    ) -> Result<Paginated<NotificationWithRefs>> {
        Ok(Notification::list_for_user(pool, actor.id, page).await?)
    }

    pub async fn unread_count(&self, pool: &DbPool, actor: &Actor) -> Result<u64> {
        Ok(Notification::unread_count(pool, actor.id).await?)
    }

    /// Marks one notification read. Repeating the call changes nothing.
    pub async fn mark_read(
        &self,
        pool: &DbPool,
        actor: &Actor,
        notification: &Notification,
    ) -> Result<Notification> {
        self.authorize_owner(actor, Action::Update, notification)?;
        Ok(Notification::mark_read(pool, notification.id).await?)
    }

    pub async fn mark_all_read(&self, pool: &DbPool, actor: &Actor) -> Result<u64> {
        let updated = Notification::mark_all_read(pool, actor.id).await?;
        tracing::debug!(user_id = actor.id, updated, "Marked notifications read");
        Ok(updated)
    }

    pub async fn delete(
        &self,
        pool: &DbPool,
        actor: &Actor,
        notification: &Notification,
    ) -> Result<()> {
        self.authorize_owner(actor, Action::Delete, notification)?;
        if Notification::delete(pool, notification.id).await? == 0 {
            return Err(ServiceError::NotFound("Notification"));
        }
        Ok(())
    }
}
