use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{
        BusinessHours, CreateGarageRequest, Garage, GarageStats, GarageStatus,
        UpdateGarageRequest,
    },
    error::{AppError, Result},
    repository::GarageRepository,
};

#[derive(FromRow)]
struct GarageRow {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
    address: String,
    city: Option<String>,
    longitude: f64,
    latitude: f64,
    phone: Option<String>,
    email: Option<String>,
    business_hours: String,
    status: String,
    is_verified: i32,
    paid_at: Option<NaiveDateTime>,
    total_bookings: i64,
    completed_bookings: i64,
    average_rating: f64,
    total_reviews: i64,
    is_deleted: i32,
    deleted_at: Option<NaiveDateTime>,
    deleted_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteGarageRepository {
    pool: SqlitePool,
}

const GARAGE_COLUMNS: &str = "id, owner_id, name, description, address, city, longitude, latitude, \
     phone, email, business_hours, status, is_verified, paid_at, \
     total_bookings, completed_bookings, average_rating, total_reviews, \
     is_deleted, deleted_at, deleted_by, created_at, updated_at";

impl SqliteGarageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_garage(row: GarageRow) -> Result<Garage> {
        let business_hours: BusinessHours = serde_json::from_str(&row.business_hours)
            .map_err(|e| AppError::Database(format!("Invalid business hours: {}", e)))?;

        Ok(Garage {
            id: parse_uuid(&row.id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            name: row.name,
            description: row.description,
            address: row.address,
            city: row.city,
            longitude: row.longitude,
            latitude: row.latitude,
            phone: row.phone,
            email: row.email,
            business_hours,
            status: GarageStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid garage status: {}", row.status)))?,
            is_verified: row.is_verified != 0,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            stats: GarageStats {
                total_bookings: row.total_bookings,
                completed_bookings: row.completed_bookings,
                average_rating: row.average_rating,
                total_reviews: row.total_reviews,
            },
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
impl GarageRepository for SqliteGarageRepository {
    async fn create(&self, owner_id: Uuid, request: CreateGarageRequest) -> Result<Garage> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let hours = request.business_hours.unwrap_or_default();
        let hours_json = serde_json::to_string(&hours)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO garages (
                id, owner_id, name, description, address, city,
                longitude, latitude, phone, email, business_hours,
                status, is_verified, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.address)
        .bind(&request.city)
        .bind(request.longitude)
        .bind(request.latitude)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(&hours_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict("Owner already has a garage".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created garage".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Garage>> {
        let row = sqlx::query_as::<_, GarageRow>(
            &format!("SELECT {GARAGE_COLUMNS} FROM garages WHERE id = ? AND is_deleted = 0")
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_garage(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Option<Garage>> {
        let row = sqlx::query_as::<_, GarageRow>(
            &format!("SELECT {GARAGE_COLUMNS} FROM garages WHERE owner_id = ? AND is_deleted = 0")
        )
        .bind(owner_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_garage(r)?)),
            None => Ok(None)
        }
    }

    async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<Garage>> {
        let rows = sqlx::query_as::<_, GarageRow>(
            &format!(
                "SELECT {GARAGE_COLUMNS} FROM garages \
                 WHERE status = 'active' AND is_deleted = 0 \
                 ORDER BY average_rating DESC, created_at DESC LIMIT ? OFFSET ?"
            )
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_garage).collect()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Garage>> {
        let rows = sqlx::query_as::<_, GarageRow>(
            &format!(
                "SELECT {GARAGE_COLUMNS} FROM garages WHERE is_deleted = 0 \
                 ORDER BY created_at DESC LIMIT ? OFFSET ?"
            )
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_garage).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateGarageRequest) -> Result<Garage> {
        let existing = self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        let name = update.name.unwrap_or(existing.name);
        let description = update.description.or(existing.description);
        let address = update.address.unwrap_or(existing.address);
        let city = update.city.or(existing.city);
        let phone = update.phone.or(existing.phone);
        let email = update.email.or(existing.email);
        let hours = update.business_hours.unwrap_or(existing.business_hours);
        let hours_json = serde_json::to_string(&hours)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE garages
            SET name = ?, description = ?, address = ?, city = ?,
                phone = ?, email = ?, business_hours = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&name)
        .bind(&description)
        .bind(&address)
        .bind(&city)
        .bind(&phone)
        .bind(&email)
        .bind(&hours_json)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated garage".to_string())
        })
    }

    async fn set_status(&self, id: Uuid, status: GarageStatus, verified: bool) -> Result<Garage> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE garages SET status = ?, is_verified = ?, updated_at = ? WHERE id = ? AND is_deleted = 0"
        )
        .bind(status.as_str())
        .bind(verified as i32)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Garage not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated garage".to_string())
        })
    }

    async fn soft_delete(&self, id: Uuid, deleted_by: Uuid) -> Result<()> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE garages
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
            return Err(AppError::NotFound("Garage not found".to_string()));
        }

        Ok(())
    }
}
