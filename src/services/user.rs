use chrono::Utc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{User, UserResponse, UserRole};
use crate::services::AuthService;

/// User service
pub struct UserService;

impl UserService {
    /// Get user by ID
    pub async fn get_user(db: &Database, user_id: &str) -> Result<User> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    pub async fn get_profile(db: &Database, user_id: &str) -> Result<UserResponse> {
        let user = Self::get_user(db, user_id).await?;
        Ok(UserResponse::from(user))
    }

    /// List all users (admin only)
    pub async fn list_users(db: &Database) -> Result<Vec<UserResponse>> {
        let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(db.pool())
            .await?;

        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    fn ensure_not_self(actor_id: &str, user_id: &str) -> Result<()> {
        if actor_id == user_id {
            return Err(AppError::BadRequest(
                "You cannot change your own account this way".to_string(),
            ));
        }
        Ok(())
    }

    /// Change a user's role; outstanding tokens carry the old role, so they are revoked
    pub async fn update_user_role(
        db: &Database,
        actor_id: &str,
        user_id: &str,
        role: UserRole,
    ) -> Result<UserResponse> {
        Self::ensure_not_self(actor_id, user_id)?;
        Self::get_user(db, user_id).await?;

        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(db.pool())
            .await?;
        AuthService::revoke_sessions(db, user_id).await?;

        let user = Self::get_user(db, user_id).await?;
        Ok(UserResponse::from(user))
    }

    /// Update user status (admin only); deactivation ends existing sessions
    pub async fn update_user_status(
        db: &Database,
        actor_id: &str,
        user_id: &str,
        is_active: bool,
    ) -> Result<UserResponse> {
        Self::ensure_not_self(actor_id, user_id)?;
        Self::get_user(db, user_id).await?;

        sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(db.pool())
            .await?;
        if !is_active {
            AuthService::revoke_sessions(db, user_id).await?;
        }

        let user = Self::get_user(db, user_id).await?;
        Ok(UserResponse::from(user))
    }
}
