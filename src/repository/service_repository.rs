use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{CreateServiceRequest, Service, ServiceCategory, UpdateServiceRequest},
    error::{AppError, Result},
    repository::ServiceRepository,
};

#[derive(FromRow)]
struct ServiceRow {
    id: String,
    garage_id: String,
    name: String,
    description: Option<String>,
    category: String,
    price_cents: i64,
    duration_minutes: i64,
    is_available: i32,
    is_deleted: i32,
    deleted_at: Option<NaiveDateTime>,
    deleted_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteServiceRepository {
    pool: SqlitePool,
}

const SERVICE_COLUMNS: &str = "id, garage_id, name, description, category, price_cents, \
     duration_minutes, is_available, is_deleted, deleted_at, deleted_by, \
     created_at, updated_at";

impl SqliteServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_service(row: ServiceRow) -> Result<Service> {
        Ok(Service {
            id: parse_uuid(&row.id)?,
            garage_id: parse_uuid(&row.garage_id)?,
            name: row.name,
            description: row.description,
            category: ServiceCategory::parse(&row.category)
                .ok_or_else(|| AppError::Database(format!("Invalid service category: {}", row.category)))?,
            price_cents: row.price_cents,
            duration_minutes: row.duration_minutes,
            is_available: row.is_available != 0,
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

#[async_trait]
impl ServiceRepository for SqliteServiceRepository {
    async fn create(&self, garage_id: Uuid, request: CreateServiceRequest) -> Result<Service> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO services (
                id, garage_id, name, description, category,
                price_cents, duration_minutes, is_available, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(garage_id.to_string())
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.category.as_str())
        .bind(request.price_cents)
        .bind(request.duration_minutes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Garage already offers a service named '{}'",
                    request.name
                ))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created service".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ? AND is_deleted = 0")
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_service(r)?)),
            None => Ok(None)
        }
    }

    async fn list_by_garage(&self, garage_id: Uuid) -> Result<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            &format!(
                "SELECT {SERVICE_COLUMNS} FROM services \
                 WHERE garage_id = ? AND is_deleted = 0 \
                 ORDER BY category, name"
            )
        )
        .bind(garage_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_service).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateServiceRequest) -> Result<Service> {
        let existing = self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

        let name = update.name.unwrap_or(existing.name);
        let description = update.description.or(existing.description);
        let category = update.category.unwrap_or(existing.category);
        let price_cents = update.price_cents.unwrap_or(existing.price_cents);
        let duration_minutes = update.duration_minutes.unwrap_or(existing.duration_minutes);
        let is_available = update.is_available.unwrap_or(existing.is_available);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE services
            SET name = ?, description = ?, category = ?, price_cents = ?,
                duration_minutes = ?, is_available = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&name)
        .bind(&description)
        .bind(category.as_str())
        .bind(price_cents)
        .bind(duration_minutes)
        .bind(is_available as i32)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict(format!("Garage already offers a service named '{}'", name))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated service".to_string())
        })
    }

    async fn soft_delete(&self, id: Uuid, deleted_by: Uuid) -> Result<()> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE services
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
            return Err(AppError::NotFound("Service not found".to_string()));
        }

        Ok(())
    }
}
