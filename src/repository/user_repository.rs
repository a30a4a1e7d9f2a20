use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{User, UserRole, CreateUserRequest, UpdateUserRequest},
    error::{AppError, Result},
    repository::UserRepository,
};

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    phone: Option<String>,
    role: String,
    can_create_garage: i32,
    is_deleted: i32,
    deleted_at: Option<NaiveDateTime>,
    deleted_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            role: UserRole::parse(&row.role)
                .ok_or_else(|| AppError::Database(format!("Invalid user role: {}", row.role)))?,
            can_create_garage: row.can_create_garage != 0,
            is_deleted: row.is_deleted != 0,
            deleted_at: row.deleted_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            deleted_by: row.deleted_by.as_deref().map(parse_uuid).transpose()?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

const USER_COLUMNS: &str = "id, email, full_name, phone, role, can_create_garage, \
     is_deleted, deleted_at, deleted_by, created_at, updated_at";

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        // Hash the password with argon2
        use argon2::{Argon2, PasswordHasher};
        use argon2::password_hash::{SaltString, rand_core::OsRng};

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(request.password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        let id_str = id.to_string();

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, full_name, phone, password_hash, role,
                can_create_garage, is_deleted, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
            "#
        )
        .bind(&id_str)
        .bind(&request.email)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&password_hash)
        .bind(request.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict("Email already registered".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created user".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND is_deleted = 0")
        )
        .bind(id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_user(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? AND is_deleted = 0")
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_user(r)?)),
            None => Ok(None)
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE is_deleted = 0 \
                 ORDER BY created_at DESC LIMIT ? OFFSET ?"
            )
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_user).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateUserRequest) -> Result<User> {
        let existing = self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let full_name = update.full_name.unwrap_or(existing.full_name);
        let phone = update.phone.or(existing.phone);
        let can_create_garage = update.can_create_garage.unwrap_or(existing.can_create_garage);
        let now = Utc::now().naive_utc();
        let id_str = id.to_string();

        sqlx::query(
            r#"
            UPDATE users
            SET full_name = ?, phone = ?, can_create_garage = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&full_name)
        .bind(&phone)
        .bind(can_create_garage as i32)
        .bind(now)
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated user".to_string())
        })
    }

    async fn soft_delete(&self, id: Uuid, deleted_by: Uuid) -> Result<()> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_deleted = 1, deleted_at = ?, deleted_by = ?, updated_at = ?
            WHERE id = ? AND is_deleted = 0
            "#
        )
        .bind(now)
        .bind(deleted_by.to_string())
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }
}

/// Fetches the stored password hash for a login attempt. Deleted accounts
/// can't log in.
pub async fn get_password_hash(pool: &SqlitePool, email: &str) -> Result<Option<String>> {
    let result = sqlx::query_scalar::<_, String>(
        "SELECT password_hash FROM users WHERE email = ? AND is_deleted = 0"
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(result)
}
