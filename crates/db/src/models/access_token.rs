use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::entities::access_token;

/// Server-side record of every issued access token, used for revocation.
pub struct AccessToken;

impl AccessToken {
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        jti: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let active = access_token::ActiveModel {
            jti: Set(jti),
            user_id: Set(user_id),
            expires_at: Set(expires_at.into()),
            revoked_at: Set(None),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        active.insert(db).await?;
        Ok(())
    }

    /// True when `jti` was issued to `user_id`, is unexpired and not revoked.
    pub async fn is_live<C: ConnectionTrait>(
        db: &C,
        jti: Uuid,
        user_id: i64,
    ) -> Result<bool, DbErr> {
        let record = access_token::Entity::find()
            .filter(access_token::Column::Jti.eq(jti))
            .filter(access_token::Column::UserId.eq(user_id))
            .one(db)
            .await?;
        Ok(record.is_some_and(|token| {
            token.revoked_at.is_none() && DateTime::<Utc>::from(token.expires_at) > Utc::now()
        }))
    }

    pub async fn revoke<C: ConnectionTrait>(db: &C, jti: Uuid) -> Result<u64, DbErr> {
        let result = access_token::Entity::update_many()
            .col_expr(access_token::Column::RevokedAt, Expr::value(Utc::now()))
            .filter(access_token::Column::Jti.eq(jti))
            .filter(access_token::Column::RevokedAt.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn revoke_all_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<u64, DbErr> {
        let result = access_token::Entity::update_many()
            .col_expr(access_token::Column::RevokedAt, Expr::value(Utc::now()))
            .filter(access_token::Column::UserId.eq(user_id))
            .filter(access_token::Column::RevokedAt.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::{
        models::user::{CreateUser, User},
        types::Role,
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn revoked_and_expired_tokens_are_not_live() {
        let db = setup_db().await;
        let user = User::create(
            &db,
            &CreateUser {
                full_name: "Tok".to_string(),
                title: None,
                email: "tok@example.com".to_string(),
                password_hash: "x".to_string(),
                role: Role::Member,
            },
        )
        .await
        .unwrap();

        let live = Uuid::new_v4();
        let stale = Uuid::new_v4();
        AccessToken::record(&db, user.id, live, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        AccessToken::record(&db, user.id, stale, Utc::now() - Duration::seconds(5))
            .await
            .unwrap();

        assert!(AccessToken::is_live(&db, live, user.id).await.unwrap());
        assert!(!AccessToken::is_live(&db, live, user.id + 1).await.unwrap());
        assert!(!AccessToken::is_live(&db, stale, user.id).await.unwrap());

        assert_eq!(AccessToken::revoke(&db, live).await.unwrap(), 1);
        assert!(!AccessToken::is_live(&db, live, user.id).await.unwrap());
        assert_eq!(AccessToken::revoke(&db, live).await.unwrap(), 0);
    }
}
