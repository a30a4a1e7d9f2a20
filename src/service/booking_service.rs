use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::authorize_owner,
    domain::{Booking, BookingStatus, BusinessHours, CreateBookingRequest, User, UserRole},
    error::{AppError, Result},
    repository::booking_repository::{row_to_booking, BookingRow, BOOKING_COLUMNS},
    service::availability::{check_business_hours, check_duration, slot_taken},
};

/// Owns the booking lifecycle. Every mutation here is a single transaction:
/// the availability re-check, the booking write, the history append and the
/// garage stat update commit together or not at all.
pub struct BookingService {
    pool: SqlitePool,
}

impl BookingService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a booking in `pending` state and bumps the garage's
    /// total-bookings counter. The slot conflict check runs inside the
    /// transaction; a concurrent create for the same slot loses on the
    /// partial unique index and surfaces as `Conflict`.
    pub async fn create(&self, actor: &User, request: CreateBookingRequest) -> Result<Booking> {
        if actor.role != UserRole::CarOwner {
            return Err(AppError::Forbidden);
        }
        if request.vehicle.make.trim().is_empty() || request.vehicle.model.trim().is_empty() {
            return Err(AppError::Validation("Vehicle make and model are required".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let garage = sqlx::query_as::<_, (String, String)>(
            "SELECT status, business_hours FROM garages WHERE id = ? AND is_deleted = 0"
        )
        .bind(request.garage_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        let (garage_status, hours_json) = garage;
        if garage_status != "active" {
            return Err(AppError::Validation("Garage is not accepting bookings".to_string()));
        }

        let service = sqlx::query_as::<_, (String, i64, i32)>(
            "SELECT garage_id, duration_minutes, is_available FROM services WHERE id = ? AND is_deleted = 0"
        )
        .bind(request.service_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

        let (service_garage, duration_minutes, is_available) = service;
        if service_garage != request.garage_id.to_string() {
            return Err(AppError::Validation("Service does not belong to this garage".to_string()));
        }
        if is_available == 0 {
            return Err(AppError::Validation("Service is currently unavailable".to_string()));
        }

        let hours: BusinessHours = serde_json::from_str(&hours_json)
            .map_err(|e| AppError::Database(format!("Invalid business hours: {}", e)))?;

        if let Some(blocked) = check_business_hours(&hours, request.date, &request.time_slot)? {
            return Err(AppError::Validation(
                blocked.reason.unwrap_or_else(|| "slot unavailable".to_string()),
            ));
        }

        if slot_taken(&mut *tx, request.garage_id, request.date, &request.time_slot).await? {
            return Err(AppError::Conflict("slot already booked".to_string()));
        }

        if let Some(blocked) = check_duration(&request.time_slot, duration_minutes) {
            return Err(AppError::Validation(
                blocked.reason.unwrap_or_else(|| "slot too short".to_string()),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, car_owner_id, garage_id, service_id, date, start_time,
                end_time, status, vehicle_make, vehicle_model, vehicle_year,
                vehicle_plate, notes, attachments, is_paid, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?, '[]', 0, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(actor.id.to_string())
        .bind(request.garage_id.to_string())
        .bind(request.service_id.to_string())
        .bind(request.date)
        .bind(&request.time_slot.start)
        .bind(&request.time_slot.end)
        .bind(&request.vehicle.make)
        .bind(&request.vehicle.model)
        .bind(request.vehicle.year)
        .bind(&request.vehicle.license_plate)
        .bind(&request.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict("slot already booked".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        append_history(&mut *tx, id, BookingStatus::Pending, actor.id, BookingStatus::Pending.default_reason()).await?;

        sqlx::query("UPDATE garages SET total_bookings = total_bookings + 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(request.garage_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let booking = load_booking(&mut *tx, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created booking".to_string())
        })?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(booking_id = %id, garage_id = %request.garage_id, "booking created");

        Ok(booking)
    }

    /// Drives the state machine. Garage owner (of this booking's garage) or
    /// admin only; car owners go through `cancel`. Repeating the current
    /// status is a successful no-op that leaves the history untouched.
    pub async fn transition(
        &self,
        actor: &User,
        booking_id: Uuid,
        target: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let booking = load_booking(&mut *tx, booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        match actor.role {
            UserRole::Admin => {}
            UserRole::GarageOwner => {
                let owner_id = sqlx::query_scalar::<_, String>(
                    "SELECT owner_id FROM garages WHERE id = ?"
                )
                .bind(booking.garage_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                if owner_id != actor.id.to_string() {
                    return Err(AppError::Forbidden);
                }
            }
            UserRole::CarOwner => return Err(AppError::Forbidden),
        }

        if booking.status == target {
            return Ok(booking);
        }

        if !booking.status.can_transition_to(target) {
            return Err(AppError::InvalidTransition {
                from: booking.status.to_string(),
                to: target.to_string(),
            });
        }

        let reason = reason.unwrap_or_else(|| target.default_reason());
        record_status_change(&mut *tx, &booking, target, actor.id, reason).await?;

        let updated = load_booking(&mut *tx, booking_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated booking".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(booking_id = %booking_id, from = %booking.status, to = %target, "booking transitioned");

        Ok(updated)
    }

    /// The car owner's one lever: cancellation, allowed only while the
    /// booking is still pending or approved.
    pub async fn cancel(
        &self,
        actor: &User,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let booking = load_booking(&mut *tx, booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        authorize_owner(actor, &booking)?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Approved) {
            return Err(AppError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            });
        }

        let reason = reason.unwrap_or_else(|| "Cancelled by customer".to_string());
        record_status_change(&mut *tx, &booking, BookingStatus::Cancelled, actor.id, reason).await?;

        let updated = load_booking(&mut *tx, booking_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated booking".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Marks the booking deleted and keeps the completed-bookings counter
    /// honest. Rows are never physically removed here; the only hard-delete
    /// path is the cascading account purge.
    pub async fn soft_delete(&self, actor: &User, booking_id: Uuid) -> Result<()> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let booking = load_booking(&mut *tx, booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE bookings
            SET is_deleted = 1, deleted_at = ?, deleted_by = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(now)
        .bind(actor.id.to_string())
        .bind(now)
        .bind(booking_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if booking.status == BookingStatus::Completed {
            sqlx::query(
                "UPDATE garages SET completed_bookings = MAX(completed_bookings - 1, 0), updated_at = ? WHERE id = ?"
            )
            .bind(now)
            .bind(booking.garage_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Appends a stored attachment reference to the booking.
    pub async fn add_attachment(
        &self,
        actor: &User,
        booking_id: Uuid,
        path: String,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let mut booking = load_booking(&mut *tx, booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        authorize_owner(actor, &booking)?;

        booking.attachments.push(path);
        let attachments = serde_json::to_string(&booking.attachments)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE bookings SET attachments = ?, updated_at = ? WHERE id = ?")
            .bind(&attachments)
            .bind(now)
            .bind(booking_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = load_booking(&mut *tx, booking_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated booking".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }
}

/// Reads a live booking within an open transaction.
pub(crate) async fn load_booking(
    tx: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Booking>> {
    let row = sqlx::query_as::<_, BookingRow>(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ? AND is_deleted = 0")
    )
    .bind(id.to_string())
    .fetch_optional(tx)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    match row {
        Some(r) => Ok(Some(row_to_booking(r)?)),
        None => Ok(None),
    }
}

/// Applies a status change: booking row, history append, and the garage
/// completed-bookings counter, all on the caller's transaction. Validity of
/// the edge is the caller's responsibility; payment-driven reversals use
/// this directly to force-cancel.
pub(crate) async fn record_status_change(
    tx: &mut SqliteConnection,
    booking: &Booking,
    target: BookingStatus,
    changed_by: Uuid,
    reason: String,
) -> Result<()> {
    let now = Utc::now().naive_utc();

    sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
        .bind(target.as_str())
        .bind(now)
        .bind(booking.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    append_history(tx, booking.id, target, changed_by, reason).await?;

    if target == BookingStatus::Completed {
        sqlx::query(
            "UPDATE garages SET completed_bookings = completed_bookings + 1, updated_at = ? WHERE id = ?"
        )
        .bind(now)
        .bind(booking.garage_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    } else if booking.status == BookingStatus::Completed {
        // Leaving completed (refund-driven cancellation) gives the counter back.
        sqlx::query(
            "UPDATE garages SET completed_bookings = MAX(completed_bookings - 1, 0), updated_at = ? WHERE id = ?"
        )
        .bind(now)
        .bind(booking.garage_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    }

    Ok(())
}

async fn append_history(
    tx: &mut SqliteConnection,
    booking_id: Uuid,
    status: BookingStatus,
    changed_by: Uuid,
    reason: String,
) -> Result<()> {
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO booking_status_history (id, booking_id, status, changed_by, reason, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(Uuid::new_v4().to_string())
    .bind(booking_id.to_string())
    .bind(status.as_str())
    .bind(changed_by.to_string())
    .bind(&reason)
    .bind(now)
    .execute(tx)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(())
}
