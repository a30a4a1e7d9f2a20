use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::authorize_owner,
    domain::{
        BookingStatus, Payment, PaymentMethod, PaymentPurpose, PaymentStatus, User,
    },
    error::{AppError, Result},
    repository::payment_repository::{row_to_payment, PaymentRow, PAYMENT_COLUMNS},
    service::booking_service::{load_booking, record_status_change},
};

const REFUND_WINDOW_DAYS: i64 = 30;

/// Links payment outcomes to the rest of the system. Webhook delivery and
/// manual verification both land here, and both are idempotent: the payment
/// status is re-read inside the transaction before anything is touched.
pub struct PaymentService {
    pool: SqlitePool,
}

impl PaymentService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Applies a definitive settlement. A booking payment marks the booking
    /// paid and auto-approves it; a garage-creation payment unlocks garage
    /// registration for the payer (and stamps the garage, if one is already
    /// linked — activation stays an admin decision). Safe to call twice.
    pub async fn on_payment_settled(&self, payment_id: Uuid) -> Result<Payment> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let payment = load_payment(&mut *tx, payment_id).await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        match payment.status {
            PaymentStatus::Completed => return Ok(payment),
            PaymentStatus::Refunded => {
                tracing::warn!(payment_id = %payment_id, "settlement reported for refunded payment, ignoring");
                return Ok(payment);
            }
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }

        let now = Utc::now().naive_utc();

        sqlx::query(
            "UPDATE payments SET status = 'completed', paid_at = COALESCE(paid_at, ?), updated_at = ? WHERE id = ?"
        )
        .bind(now)
        .bind(now)
        .bind(payment_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match payment.purpose {
            PaymentPurpose::GarageCreation => {
                sqlx::query(
                    "UPDATE users SET can_create_garage = 1, updated_at = ? WHERE id = ?"
                )
                .bind(now)
                .bind(payment.user_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                if let Some(garage_id) = payment.garage_id {
                    // Payment never activates a garage by itself.
                    sqlx::query("UPDATE garages SET paid_at = ?, updated_at = ? WHERE id = ?")
                        .bind(now)
                        .bind(now)
                        .bind(garage_id.to_string())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                }
            }
            PaymentPurpose::Booking => {
                let booking_id = payment.booking_id.ok_or_else(|| {
                    AppError::Internal("Booking payment has no booking reference".to_string())
                })?;

                match load_booking(&mut *tx, booking_id).await? {
                    Some(booking) => {
                        sqlx::query(
                            "UPDATE bookings SET is_paid = 1, payment_id = ?, updated_at = ? WHERE id = ?"
                        )
                        .bind(payment.id.to_string())
                        .bind(now)
                        .bind(booking_id.to_string())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;

                        if booking.status == BookingStatus::Pending {
                            record_status_change(
                                &mut *tx,
                                &booking,
                                BookingStatus::Approved,
                                payment.user_id,
                                "Payment received".to_string(),
                            )
                            .await?;
                        }
                    }
                    None => {
                        tracing::warn!(
                            payment_id = %payment_id,
                            booking_id = %booking_id,
                            "settled payment references a missing booking"
                        );
                    }
                }
            }
        }

        let updated = load_payment(&mut *tx, payment_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated payment".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(payment_id = %payment_id, purpose = %payment.purpose.as_str(), "payment settled");

        Ok(updated)
    }

    /// Applies a provider-reported refund: the mirror image of settlement.
    /// Safe to call twice.
    pub async fn on_payment_refunded(&self, payment_id: Uuid) -> Result<Payment> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let payment = load_payment(&mut *tx, payment_id).await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status == PaymentStatus::Refunded {
            return Ok(payment);
        }

        apply_refund(&mut *tx, &payment).await?;

        let updated = load_payment(&mut *tx, payment_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated payment".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(payment_id = %payment_id, "payment refunded");

        Ok(updated)
    }

    /// Policy-checked refund entry point for the API: payment owner or
    /// admin, completed payments only, and a 30-day window from `paid_at`
    /// that admins are exempt from.
    pub async fn refund(&self, actor: &User, payment_id: Uuid) -> Result<Payment> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let payment = load_payment(&mut *tx, payment_id).await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        authorize_owner(actor, &payment)?;

        if payment.status == PaymentStatus::Refunded {
            return Ok(payment);
        }
        if payment.status != PaymentStatus::Completed {
            return Err(AppError::Validation(
                "Only completed payments can be refunded".to_string(),
            ));
        }

        if !actor.is_admin() {
            let paid_at = payment.paid_at.ok_or_else(|| {
                AppError::Internal("Completed payment has no paid_at timestamp".to_string())
            })?;
            if Utc::now() - paid_at > Duration::days(REFUND_WINDOW_DAYS) {
                return Err(AppError::Validation(format!(
                    "Refund window of {} days has passed",
                    REFUND_WINDOW_DAYS
                )));
            }
        }

        apply_refund(&mut *tx, &payment).await?;

        let updated = load_payment(&mut *tx, payment_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated payment".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(payment_id = %payment_id, actor = %actor.id, "refund applied");

        Ok(updated)
    }

    /// Records an out-of-band payment (bank transfer, waived fee) and runs
    /// it through the normal settlement path so the side effects converge.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_manual(
        &self,
        actor: &User,
        user_id: Uuid,
        purpose: PaymentPurpose,
        booking_id: Option<Uuid>,
        garage_id: Option<Uuid>,
        amount_cents: i64,
        description: String,
        waived: bool,
    ) -> Result<Payment> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }
        if amount_cents < 0 {
            return Err(AppError::Validation("Amount must not be negative".to_string()));
        }
        if purpose == PaymentPurpose::Booking && booking_id.is_none() {
            return Err(AppError::Validation("Booking payment requires a booking id".to_string()));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            purpose,
            booking_id,
            garage_id,
            amount_cents: if waived { 0 } else { amount_cents },
            currency: "USD".to_string(),
            status: PaymentStatus::Pending,
            payment_method: if waived { PaymentMethod::Waived } else { PaymentMethod::Manual },
            transaction_id: None,
            description,
            paid_at: None,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let created = insert_payment(&self.pool, &payment).await?;
        self.on_payment_settled(created.id).await
    }

    /// Marks a pending payment failed (expired checkout, declined card).
    pub async fn mark_failed(&self, payment_id: Uuid) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            "UPDATE payments SET status = 'failed', updated_at = ? WHERE id = ? AND status = 'pending'"
        )
        .bind(now)
        .bind(payment_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

/// Reverses a payment's effects on the caller's transaction. The booking is
/// force-cancelled even from `completed` — refunds are a system-level
/// reversal, not an actor-driven transition.
async fn apply_refund(tx: &mut SqliteConnection, payment: &Payment) -> Result<()> {
    let now = Utc::now().naive_utc();

    sqlx::query("UPDATE payments SET status = 'refunded', updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(payment.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    match payment.purpose {
        PaymentPurpose::Booking => {
            if let Some(booking_id) = payment.booking_id {
                if let Some(booking) = load_booking(&mut *tx, booking_id).await? {
                    sqlx::query("UPDATE bookings SET is_paid = 0, updated_at = ? WHERE id = ?")
                        .bind(now)
                        .bind(booking_id.to_string())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;

                    if booking.status != BookingStatus::Cancelled {
                        record_status_change(
                            &mut *tx,
                            &booking,
                            BookingStatus::Cancelled,
                            payment.user_id,
                            "Payment refunded".to_string(),
                        )
                        .await?;
                    }
                }
            }
        }
        PaymentPurpose::GarageCreation => {
            sqlx::query("UPDATE users SET can_create_garage = 0, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(payment.user_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
    }

    Ok(())
}

async fn insert_payment(pool: &SqlitePool, payment: &Payment) -> Result<Payment> {
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, user_id, purpose, booking_id, garage_id, amount_cents,
            currency, status, payment_method, transaction_id, description,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(payment.id.to_string())
    .bind(payment.user_id.to_string())
    .bind(payment.purpose.as_str())
    .bind(payment.booking_id.map(|id| id.to_string()))
    .bind(payment.garage_id.map(|id| id.to_string()))
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(payment.payment_method.as_str())
    .bind(&payment.transaction_id)
    .bind(&payment.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    let mut conn = pool.acquire().await.map_err(|e| AppError::Database(e.to_string()))?;
    load_payment(&mut *conn, payment.id).await?.ok_or_else(|| {
        AppError::Database("Failed to retrieve created payment".to_string())
    })
}

pub(crate) async fn load_payment(
    tx: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Payment>> {
    let row = sqlx::query_as::<_, PaymentRow>(
        &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ? AND is_deleted = 0")
    )
    .bind(id.to_string())
    .fetch_optional(tx)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    match row {
        Some(r) => Ok(Some(row_to_payment(r)?)),
        None => Ok(None),
    }
}
