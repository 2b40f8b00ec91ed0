use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;

/// Postgres SQLSTATE for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// User record in the database. Email and password are immutable after
/// creation; profile updates touch nickname/intro/updated_at only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nickname: String,
    pub intro: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

impl User {
    /// Insert a new user. A violation of the email uniqueness constraint is
    /// surfaced as `RepoError::DuplicateEmail`, never as a raw database error.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> Result<User, RepoError> {
        let now = now_millis();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, nickname, intro, created_at, updated_at)
            VALUES ($1, $2, '', '', $3, $3)
            RETURNING id, email, password_hash, nickname, intro, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::DuplicateEmail
            } else {
                RepoError::Database(e)
            }
        })?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, nickname, intro, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, nickname, intro, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Update the mutable profile fields, stamping `updated_at`.
    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        nickname: &str,
        intro: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET nickname = $2, intro = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(nickname)
        .bind(intro)
        .bind(now_millis())
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
