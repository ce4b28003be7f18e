//! Registration, login and token lifecycle.

use db::{
    DbErr, DbPool, TransactionTrait,
    models::{
        access_token::AccessToken,
        user::{CreateUser, User},
    },
    types::Role,
};
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utils_jwt::{JwtError, TokenSigner, generate_refresh_token, hash_refresh_token};
use uuid::Uuid;

const NAME_MAX_LEN: usize = 255;
const EMAIL_MAX_LEN: usize = 255;
const PASSWORD_MIN_LEN: usize = 6;
const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] argon2::Error),
    #[error("password hashing task failed: {0}")]
    HashTask(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Validation(String),
    #[error("The provided credentials are incorrect.")]
    InvalidCredentials,
    #[error("Your account has been deactivated.")]
    Deactivated,
    #[error("Invalid refresh token.")]
    InvalidRefreshToken,
    #[error("Unauthenticated.")]
    Unauthenticated,
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RegisterRequest {
    pub full_name: String,
    pub title: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
    /// When present, must match the account the refresh token belongs to.
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// The authenticated user of a request and the token they presented.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub jti: Uuid,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    }
}

fn validate_registration(payload: &RegisterRequest) -> Result<()> {
    let full_name = payload.full_name.trim();
    if full_name.is_empty() {
        return Err(AuthError::Validation("The full name field is required.".to_string()));
    }
    if full_name.chars().count() > NAME_MAX_LEN {
        return Err(AuthError::Validation(format!(
            "The full name field must not be greater than {NAME_MAX_LEN} characters."
        )));
    }
    if payload
        .title
        .as_deref()
        .is_some_and(|title| title.chars().count() > NAME_MAX_LEN)
    {
        return Err(AuthError::Validation(format!(
            "The title field must not be greater than {NAME_MAX_LEN} characters."
        )));
    }
    let email = payload.email.trim();
    if !looks_like_email(email) || email.len() > EMAIL_MAX_LEN {
        return Err(AuthError::Validation(
            "The email field must be a valid email address.".to_string(),
        ));
    }
    if payload.password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AuthError::Validation(format!(
            "The password field must be at least {PASSWORD_MIN_LEN} characters."
        )));
    }
    Ok(())
}

async fn hash_password(password: String) -> Result<String> {
    let salt: [u8; SALT_LEN] = rand::thread_rng().r#gen();
    let hash = tokio::task::spawn_blocking(move || {
        argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
    })
    .await??;
    Ok(hash)
}

/// A stored hash that cannot be decoded never matches.
async fn verify_password(hash: String, password: String) -> Result<bool> {
    let outcome =
        tokio::task::spawn_blocking(move || argon2::verify_encoded(&hash, password.as_bytes()))
            .await?;
    Ok(outcome.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Stored password hash is unreadable");
        false
    }))
}

#[derive(Clone, Debug)]
pub struct AuthService {
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(signer: TokenSigner) -> Self {
        Self { signer }
    }

    /// Issues a new access token and rotates the user's refresh secret.
    async fn issue_tokens(&self, pool: &DbPool, user: &User) -> Result<TokenResponse> {
        let access = self.signer.issue(user.id)?;
        let refresh_token = generate_refresh_token();

        let tx = pool.begin().await?;
        AccessToken::record(&tx, user.id, access.jti, access.expires_at).await?;
        User::set_refresh_token_hash(&tx, user.id, Some(hash_refresh_token(&refresh_token)))
            .await?;
        tx.commit().await?;

        Ok(TokenResponse {
            access_token: access.token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.signer.ttl().num_seconds(),
            user: None,
        })
    }

    pub async fn register(&self, pool: &DbPool, payload: RegisterRequest) -> Result<TokenResponse> {
        validate_registration(&payload)?;
        let email = payload.email.trim().to_string();
        if User::email_exists(pool, &email).await? {
            return Err(AuthError::Validation(
                "The email has already been taken.".to_string(),
            ));
        }

        let password_hash = hash_password(payload.password).await?;
        let user = User::create(
            pool,
            &CreateUser {
                full_name: payload.full_name.trim().to_string(),
                title: payload.title,
                email,
                password_hash,
                role: payload.role.unwrap_or_default(),
            },
        )
        .await?;
        tracing::info!(user_id = user.id, role = %user.role, "User registered");

        let tokens = self.issue_tokens(pool, &user).await?;
        Ok(TokenResponse {
            user: Some(user),
            ..tokens
        })
    }

    pub async fn login(&self, pool: &DbPool, payload: LoginRequest) -> Result<TokenResponse> {
        let Some((user, hash)) = User::find_credentials(pool, payload.email.trim()).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(hash, payload.password).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::Deactivated);
        }

        let tokens = self.issue_tokens(pool, &user).await?;
        Ok(TokenResponse {
            user: Some(user),
            ..tokens
        })
    }

    /// Exchanges a refresh secret for a new token pair. Earlier access
    /// tokens of the user are revoked and the old secret stops working.
    pub async fn refresh(&self, pool: &DbPool, payload: RefreshRequest) -> Result<TokenResponse> {
        if payload.refresh_token.trim().is_empty() {
            return Err(AuthError::Validation(
                "The refresh token field is required.".to_string(),
            ));
        }
        let hash = hash_refresh_token(payload.refresh_token.trim());
        let user = User::find_by_refresh_token_hash(pool, &hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if let Some(email) = payload.email.as_deref().map(str::trim)
            && email != user.email
        {
            return Err(AuthError::InvalidRefreshToken);
        }
        if !user.is_active {
            return Err(AuthError::Deactivated);
        }

        AccessToken::revoke_all_for_user(pool, user.id).await?;
        self.issue_tokens(pool, &user).await
    }

    /// Revokes the presented access token and forgets the refresh secret.
    pub async fn logout(&self, pool: &DbPool, session: &Session) -> Result<()> {
        let tx = pool.begin().await?;
        AccessToken::revoke(&tx, session.jti).await?;
        User::set_refresh_token_hash(&tx, session.user.id, None).await?;
        tx.commit().await?;
        tracing::debug!(user_id = session.user.id, "User logged out");
        Ok(())
    }

    /// Resolves a bearer token to its live session.
    pub async fn authenticate(&self, pool: &DbPool, token: &str) -> Result<Session> {
        let claims = self.signer.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "Rejected access token");
            AuthError::Unauthenticated
        })?;
        let user_id = claims.user_id().map_err(|_| AuthError::Unauthenticated)?;
        if !AccessToken::is_live(pool, claims.jti, user_id).await? {
            tracing::warn!(user_id, "Revoked or unknown access token presented");
            return Err(AuthError::Unauthenticated);
        }
        let user = User::find_by_id(pool, user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AuthError::Unauthenticated)?;
        Ok(Session {
            user,
            jti: claims.jti,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::services::test_db::TestDb;

    fn service() -> AuthService {
        AuthService::new(TokenSigner::new("test-secret", Duration::minutes(5)))
    }

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Ada Lovelace".to_string(),
            title: Some("Engineer".to_string()),
            email: email.to_string(),
            password: "secret1".to_string(),
            role: None,
        }
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.io"));
        assert!(!looks_like_email("nobody"));
        assert!(!looks_like_email("a b@c.io"));
        assert!(!looks_like_email("@c.io"));
    }

    #[tokio::test]
    async fn register_login_and_authenticate() {
        let t = TestDb::new().await;
        let auth = service();

        let registered = auth.register(&t.db, registration("ada@example.com")).await.unwrap();
        let user = registered.user.clone().unwrap();
        assert_eq!(user.role, Role::Member);
        assert_eq!(registered.token_type, "Bearer");
        assert_eq!(registered.refresh_token.len(), 64);

        let session = auth.authenticate(&t.db, &registered.access_token).await.unwrap();
        assert_eq!(session.user.id, user.id);

        let err = auth
            .register(&t.db, registration("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = auth
            .login(
                &t.db,
                LoginRequest {
                    email: "ada@example.com".to_string(),
                    password: "wrong-password".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let logged_in = auth
            .login(
                &t.db,
                LoginRequest {
                    email: "ada@example.com".to_string(),
                    password: "secret1".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(logged_in.user.is_some());
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let t = TestDb::new().await;
        let err = service()
            .register(
                &t.db,
                RegisterRequest {
                    password: "12345".to_string(),
                    ..registration("short@example.com")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn refresh_rotates_and_logout_revokes() {
        let t = TestDb::new().await;
        let auth = service();
        let first = auth.register(&t.db, registration("rot@example.com")).await.unwrap();

        let second = auth
            .refresh(
                &t.db,
                RefreshRequest {
                    refresh_token: first.refresh_token.clone(),
                    email: Some("rot@example.com".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(second.user.is_none());
        assert_ne!(second.refresh_token, first.refresh_token);

        // The old secret and the old access token are both dead now.
        let err = auth
            .refresh(
                &t.db,
                RefreshRequest {
                    refresh_token: first.refresh_token,
                    email: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
        assert!(matches!(
            auth.authenticate(&t.db, &first.access_token).await,
            Err(AuthError::Unauthenticated)
        ));

        let session = auth.authenticate(&t.db, &second.access_token).await.unwrap();
        auth.logout(&t.db, &session).await.unwrap();
        assert!(matches!(
            auth.authenticate(&t.db, &second.access_token).await,
            Err(AuthError::Unauthenticated)
        ));
        let err = auth
            .refresh(
                &t.db,
                RefreshRequest {
                    refresh_token: second.refresh_token,
                    email: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn deactivated_user_cannot_log_in() {
        let t = TestDb::new().await;
        let auth = service();
        let registered = auth.register(&t.db, registration("gone@example.com")).await.unwrap();
        let user = registered.user.unwrap();
        User::set_active(&t.db, user.id, false).await.unwrap();

        let err = auth
            .login(
                &t.db,
                LoginRequest {
                    email: "gone@example.com".to_string(),
                    password: "secret1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Deactivated));
        assert!(matches!(
            auth.authenticate(&t.db, &registered.access_token).await,
            Err(AuthError::Unauthenticated)
        ));
    }
}
