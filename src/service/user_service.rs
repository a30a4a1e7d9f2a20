use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::authorize_owner,
    domain::{CreateUserRequest, UpdateUserRequest, User, UserRole},
    error::{AppError, Result},
    repository::UserRepository,
};

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    pool: sqlx::SqlitePool,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, pool: sqlx::SqlitePool) -> Self {
        Self { repo, pool }
    }

    /// Self-service registration. Admin accounts are seeded, never
    /// self-registered.
    pub async fn register(&self, request: CreateUserRequest) -> Result<User> {
        if request.role == UserRole::Admin {
            return Err(AppError::Validation(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }
        if !request.email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if request.password.len() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        if self.repo.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        self.repo.create(request).await
    }

    pub async fn update(&self, actor: &User, user_id: Uuid, update: UpdateUserRequest) -> Result<User> {
        let user = self.repo.find_by_id(user_id).await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        authorize_owner(actor, &user)?;

        // Only admins may hand out the garage-creation entitlement directly.
        if update.can_create_garage.is_some() && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        self.repo.update(user_id, update).await
    }

    pub async fn soft_delete(&self, actor: &User, user_id: Uuid) -> Result<()> {
        let user = self.repo.find_by_id(user_id).await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        authorize_owner(actor, &user)?;

        self.repo.soft_delete(user_id, actor.id).await
    }

    /// Hard purge, admin only: removes the account and its dependent rows.
    /// Payments stay for audit. Returns the attachment paths of purged
    /// bookings so the caller can clean up files best-effort.
    pub async fn hard_delete(&self, actor: &User, user_id: Uuid) -> Result<Vec<String>> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;
        let user_id_str = user_id.to_string();

        let attachment_blobs = sqlx::query_scalar::<_, String>(
            "SELECT attachments FROM bookings WHERE car_owner_id = ?"
        )
        .bind(&user_id_str)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut attachments = Vec::new();
        for blob in attachment_blobs {
            let paths: Vec<String> = serde_json::from_str(&blob)
                .map_err(|e| AppError::Database(format!("Invalid attachment list: {}", e)))?;
            attachments.extend(paths);
        }

        sqlx::query(
            "DELETE FROM booking_status_history WHERE booking_id IN \
             (SELECT id FROM bookings WHERE car_owner_id = ?)"
        )
        .bind(&user_id_str)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM reviews WHERE car_owner_id = ?")
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM bookings WHERE car_owner_id = ?")
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let now = chrono::Utc::now().naive_utc();
        sqlx::query(
            "UPDATE garages SET is_deleted = 1, deleted_at = ?, deleted_by = ?, updated_at = ? \
             WHERE owner_id = ? AND is_deleted = 0"
        )
        .bind(now)
        .bind(actor.id.to_string())
        .bind(now)
        .bind(&user_id_str)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(user_id = %user_id, actor = %actor.id, "user purged");

        Ok(attachments)
    }
}
