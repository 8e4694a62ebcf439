use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{User, UserId},
    Error, Result,
};

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new user
    pub async fn create(&self, user: &User) -> Result<User> {
        let row = sqlx::query(
            r"
            INSERT INTO users (id, username, email, external_identity_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, external_identity_id, created_at, updated_at, deleted_at
            ",
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.external_identity_id.as_ref())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.constraint().is_some() => {
                Error::AlreadyExists("User with this username already exists".to_string())
            }
            _ => Error::from(e),
        })?;

        Self::row_to_user(&row)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, external_identity_id, created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// List users, newest first
    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r"
            SELECT id, username, email, external_identity_id, created_at, updated_at, deleted_at
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_user).collect()
    }

    /// Soft delete user
    pub async fn delete(&self, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET deleted_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(user_id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored directory identity id
    pub async fn update_external_identity(
        &self,
        user_id: &UserId,
        external_identity_id: Option<&str>,
    ) -> Result<User> {
        let row = sqlx::query(
            r"
            UPDATE users
            SET external_identity_id = $2, updated_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, username, email, external_identity_id, created_at, updated_at, deleted_at
            ",
        )
        .bind(user_id.as_str())
        .bind(external_identity_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_user(&row)
    }

    /// Check if username exists
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) as count
            FROM users
            WHERE username = $1 AND deleted_at IS NULL
            ",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Convert database row to User model
    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_string(row.try_get("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            external_identity_id: row.try_get("external_identity_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}
