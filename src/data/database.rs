//! SQLite database operations
//!
//! All database access goes through this module.
//! Storage failures surface as `AppError::Database`, distinct from
//! "not found" which is expressed through `Option`/`bool` returns.

use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::{MediaRecord, User};
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database file and run migrations.
    ///
    /// Creates the file if it does not exist.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Get a user by Telegram user id.
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Insert a user row, ignoring the insert if the id already exists.
    ///
    /// # Returns
    /// `true` if a new row was created.
    pub async fn insert_user(&self, user: &User) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (
                user_id, chat_id, first_name, last_name, username,
                is_authorized, is_admin, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.user_id)
        .bind(user.chat_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(user.is_authorized)
        .bind(user.is_admin)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Insert a user as bootstrap admin only when the table is empty.
    ///
    /// This is atomic at the SQL statement level and prevents races where
    /// two concurrent first contacts are both granted bootstrap admin.
    ///
    /// # Returns
    /// `true` if inserted as the first user (authorized admin),
    /// `false` if at least one user already existed.
    pub async fn insert_user_if_first(&self, user: &User) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                user_id, chat_id, first_name, last_name, username,
                is_authorized, is_admin, created_at
            )
            SELECT ?, ?, ?, ?, ?, 1, 1, ?
            WHERE NOT EXISTS (SELECT 1 FROM users)
            "#,
        )
        .bind(user.user_id)
        .bind(user.chat_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Set authorization flags for a user.
    ///
    /// # Returns
    /// `true` if updated, `false` if no matching user row exists.
    pub async fn set_authorization(
        &self,
        user_id: i64,
        is_authorized: bool,
        is_admin: bool,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_authorized = ?, is_admin = ?
            WHERE user_id = ?
            "#,
        )
        .bind(is_authorized)
        .bind(is_admin)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Total number of registered users.
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Whether no users exist yet.
    ///
    /// Only meaningful as a read-side hint; registration itself relies on
    /// [`Database::insert_user_if_first`] to decide bootstrap admin
    /// atomically.
    pub async fn is_first_user(&self) -> Result<bool, AppError> {
        Ok(self.count_users().await? == 0)
    }

    /// Page through users in registration order.
    pub async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at ASC, user_id ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// All current admins, for notification fan-out.
    pub async fn list_admins(&self) -> Result<Vec<User>, AppError> {
        let admins = sqlx::query_as::<_, User>("SELECT * FROM users WHERE is_admin = 1")
            .fetch_all(&self.pool)
            .await?;

        Ok(admins)
    }

    /// Store or replace the media record for a message id.
    pub async fn upsert_media(&self, record: &MediaRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO media (
                message_id, file_name, mime_type, file_size, file_id,
                duration, width, height, title, performer,
                is_voice, is_animation, telegram_file_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.message_id)
        .bind(&record.file_name)
        .bind(&record.mime_type)
        .bind(record.file_size)
        .bind(record.file_id)
        .bind(record.duration)
        .bind(record.width)
        .bind(record.height)
        .bind(&record.title)
        .bind(&record.performer)
        .bind(record.is_voice)
        .bind(record.is_animation)
        .bind(&record.telegram_file_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the media record for a message id.
    pub async fn get_media(&self, message_id: i64) -> Result<Option<MediaRecord>, AppError> {
        let record =
            sqlx::query_as::<_, MediaRecord>("SELECT * FROM media WHERE message_id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }
}
