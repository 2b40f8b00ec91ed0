use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;

use crate::users::password::{hash_password, verify_password};
use crate::users::repo::{RepoError, User};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for ServiceError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::DuplicateEmail => ServiceError::DuplicateEmail,
            RepoError::NotFound => ServiceError::NotFound,
            RepoError::Database(e) => ServiceError::Internal(e.into()),
        }
    }
}

/// Account orchestration: hashing, credential checks and error translation.
/// Handlers never see storage errors directly.
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<(), ServiceError> {
        let hash = hash_password(password)?;
        let user = User::create(&self.db, email, &hash).await?;
        tracing::info!(user_id = user.id, "user registered");
        Ok(())
    }

    /// Unknown email and wrong password collapse into the same outcome so the
    /// response never reveals which one it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let user = match User::find_by_email(&self.db, email).await? {
            Some(u) => u,
            None => {
                warn!("login with unknown email");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "login with invalid password");
            return Err(ServiceError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, ServiceError> {
        User::find_by_id(&self.db, user_id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        nickname: &str,
        intro: &str,
    ) -> Result<(), ServiceError> {
        User::update_profile(&self.db, user_id, nickname, intro).await?;
        Ok(())
    }
}
