use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingStatistics, BookingStatus, StatusHistoryEntry, TimeSlot, VehicleInfo,
    },
    error::{AppError, Result},
    repository::BookingRepository,
};

// The row struct and its mapping are shared with the booking service, which
// re-reads rows inside its transactions.
#[derive(FromRow)]
pub(crate) struct BookingRow {
    id: String,
    car_owner_id: String,
    garage_id: String,
    service_id: String,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    status: String,
    vehicle_make: String,
    vehicle_model: String,
    vehicle_year: Option<i64>,
    vehicle_plate: Option<String>,
    notes: Option<String>,
    attachments: String,
    is_paid: i32,
    payment_id: Option<String>,
    is_deleted: i32,
    deleted_at: Option<NaiveDateTime>,
    deleted_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct HistoryRow {
    id: String,
    booking_id: String,
    status: String,
    changed_by: String,
    reason: String,
    created_at: NaiveDateTime,
}

pub(crate) const BOOKING_COLUMNS: &str =
    "id, car_owner_id, garage_id, service_id, date, start_time, end_time, \
     status, vehicle_make, vehicle_model, vehicle_year, vehicle_plate, \
     notes, attachments, is_paid, payment_id, is_deleted, deleted_at, \
     deleted_by, created_at, updated_at";

pub(crate) fn row_to_booking(row: BookingRow) -> Result<Booking> {
    let attachments: Vec<String> = serde_json::from_str(&row.attachments)
        .map_err(|e| AppError::Database(format!("Invalid attachment list: {}", e)))?;

    Ok(Booking {
        id: parse_uuid(&row.id)?,
        car_owner_id: parse_uuid(&row.car_owner_id)?,
        garage_id: parse_uuid(&row.garage_id)?,
        service_id: parse_uuid(&row.service_id)?,
        date: row.date,
        time_slot: TimeSlot {
            start: row.start_time,
            end: row.end_time,
        },
        status: BookingStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid booking status: {}", row.status)))?,
        vehicle: VehicleInfo {
            make: row.vehicle_make,
            model: row.vehicle_model,
            year: row.vehicle_year,
            license_plate: row.vehicle_plate,
        },
        notes: row.notes,
        attachments,
        is_paid: row.is_paid != 0,
        payment_id: row.payment_id.as_deref().map(parse_uuid).transpose()?,
        is_deleted: row.is_deleted != 0,
        deleted_at: row.deleted_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        deleted_by: row.deleted_by.as_deref().map(parse_uuid).transpose()?,
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_history(row: HistoryRow) -> Result<StatusHistoryEntry> {
        Ok(StatusHistoryEntry {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            status: BookingStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid booking status: {}", row.status)))?,
            changed_by: parse_uuid(&row.changed_by)?,
            reason: row.reason,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ? AND is_deleted = 0")
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(row_to_booking(r)?)),
            None => Ok(None)
        }
    }

    async fn list_by_car_owner(&self, car_owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 WHERE car_owner_id = ? AND is_deleted = 0 \
                 ORDER BY date DESC, start_time DESC LIMIT ? OFFSET ?"
            )
        )
        .bind(car_owner_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_booking).collect()
    }

    async fn list_by_garage(&self, garage_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 WHERE garage_id = ? AND is_deleted = 0 \
                 ORDER BY date DESC, start_time DESC LIMIT ? OFFSET ?"
            )
        )
        .bind(garage_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_booking).collect()
    }

    async fn list_by_garage_date_range(
        &self,
        garage_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 WHERE garage_id = ? AND date >= ? AND date <= ? AND is_deleted = 0 \
                 ORDER BY date, start_time"
            )
        )
        .bind(garage_id.to_string())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_booking).collect()
    }

    async fn history(&self, booking_id: Uuid) -> Result<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, booking_id, status, changed_by, reason, created_at
            FROM booking_status_history
            WHERE booking_id = ?
            ORDER BY created_at, id
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_history).collect()
    }

    async fn statistics(&self, garage_id: Option<Uuid>) -> Result<BookingStatistics> {
        let sql = match garage_id {
            Some(_) => {
                "SELECT status, COUNT(*) as count FROM bookings \
                 WHERE garage_id = ? AND is_deleted = 0 GROUP BY status"
            }
            None => {
                "SELECT status, COUNT(*) as count FROM bookings \
                 WHERE is_deleted = 0 GROUP BY status"
            }
        };

        let mut query = sqlx::query_as::<_, (String, i64)>(sql);
        if let Some(garage_id) = garage_id {
            query = query.bind(garage_id.to_string());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut stats = BookingStatistics::default();
        for (status, count) in rows {
            stats.total += count;
            match BookingStatus::parse(&status) {
                Some(BookingStatus::Pending) => stats.pending = count,
                Some(BookingStatus::Approved) => stats.approved = count,
                Some(BookingStatus::Rejected) => stats.rejected = count,
                Some(BookingStatus::InProgress) => stats.in_progress = count,
                Some(BookingStatus::Completed) => stats.completed = count,
                Some(BookingStatus::Cancelled) => stats.cancelled = count,
                None => {
                    return Err(AppError::Database(format!("Invalid booking status: {}", status)));
                }
            }
        }

        Ok(stats)
    }

    async fn upcoming_active_for_service(&self, service_id: Uuid, today: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE service_id = ? AND date >= ?
              AND status IN ('pending', 'approved', 'in_progress')
              AND is_deleted = 0
            "#
        )
        .bind(service_id.to_string())
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }

    async fn upcoming_active_for_garage(&self, garage_id: Uuid, today: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE garage_id = ? AND date >= ?
              AND status IN ('pending', 'approved', 'in_progress')
              AND is_deleted = 0
            "#
        )
        .bind(garage_id.to_string())
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }
}
