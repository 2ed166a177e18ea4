//! User operations

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{NewUser, UpdateUser, User};

use super::Database;

impl Database {
    /// Insert a new user
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        match self.find_user_by_username(&user.username).await {
            Err(DbError::NotFound(_)) => {}
            Ok(_) | Err(DbError::Ambiguous(_)) => {
                return Err(DbError::Duplicate(format!(
                    "User '{}' already exists",
                    user.username
                )));
            }
            Err(e) => return Err(e),
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, superuser, created_at, updated_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.superuser)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            superuser: user.superuser,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up a live user by username.
    ///
    /// More than one live row for a username is a data-integrity failure
    /// and is reported as `Ambiguous`, never silently resolved.
    pub async fn find_user_by_username(&self, username: &str) -> Result<User, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, superuser, created_at, updated_at
            FROM users
            WHERE username = ? AND deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        match rows.len() {
            0 => Err(DbError::NotFound(format!("user: {}", username))),
            1 => User::try_from(&rows[0]).map_err(DbError::from),
            _ => Err(DbError::Ambiguous(format!("user: {}", username))),
        }
    }

    /// Get a live user by ID
    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, superuser, created_at, updated_at
            FROM users
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Apply a partial update to a live user and return the new row.
    pub async fn update_user(&self, id: &str, changes: UpdateUser) -> Result<User, DbError> {
        let user = self
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("user: {}", id)))?;

        if let Some(new_username) = &changes.username {
            if *new_username != user.username {
                match self.find_user_by_username(new_username).await {
                    Err(DbError::NotFound(_)) => {}
                    Ok(_) | Err(DbError::Ambiguous(_)) => {
                        return Err(DbError::Duplicate(format!(
                            "User '{}' already exists",
                            new_username
                        )));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let username = changes.username.unwrap_or(user.username.clone());
        let email = changes.email.unwrap_or(user.email.clone());
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&username)
        .bind(&email)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(User {
            username,
            email,
            updated_at: now,
            ..user
        })
    }

    /// Soft-delete a user; the row stays but becomes invisible to lookups.
    pub async fn soft_delete_user(&self, id: &str) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any live users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
