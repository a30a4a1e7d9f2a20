use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentMethod, PaymentPurpose, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
pub(crate) struct PaymentRow {
    id: String,
    user_id: String,
    purpose: String,
    booking_id: Option<String>,
    garage_id: Option<String>,
    amount_cents: i64,
    currency: String,
    status: String,
    payment_method: String,
    transaction_id: Option<String>,
    description: String,
    paid_at: Option<NaiveDateTime>,
    is_deleted: i32,
    deleted_at: Option<NaiveDateTime>,
    deleted_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub(crate) const PAYMENT_COLUMNS: &str =
    "id, user_id, purpose, booking_id, garage_id, amount_cents, currency, \
     status, payment_method, transaction_id, description, paid_at, \
     is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub(crate) fn row_to_payment(row: PaymentRow) -> Result<Payment> {
    Ok(Payment {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        purpose: PaymentPurpose::parse(&row.purpose)
            .ok_or_else(|| AppError::Database(format!("Invalid payment purpose: {}", row.purpose)))?,
        booking_id: row.booking_id.as_deref().map(parse_uuid).transpose()?,
        garage_id: row.garage_id.as_deref().map(parse_uuid).transpose()?,
        amount_cents: row.amount_cents,
        currency: row.currency,
        status: PaymentStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
        payment_method: PaymentMethod::parse(&row.payment_method)
            .ok_or_else(|| AppError::Database(format!("Invalid payment method: {}", row.payment_method)))?,
        transaction_id: row.transaction_id,
        description: row.description,
        paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
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

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let now = Utc::now().naive_utc();
        let paid_at_naive = payment.paid_at.map(|dt| dt.naive_utc());

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, purpose, booking_id, garage_id, amount_cents,
                currency, status, payment_method, transaction_id,
                description, paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        .bind(paid_at_naive)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict("Payment with this transaction id already exists".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ? AND is_deleted = 0")
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = ? AND is_deleted = 0")
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            &format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments \
                 WHERE booking_id = ? AND is_deleted = 0 \
                 ORDER BY created_at DESC LIMIT 1"
            )
        )
        .bind(booking_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            &format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments \
                 WHERE user_id = ? AND is_deleted = 0 \
                 ORDER BY created_at DESC"
            )
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_payment).collect()
    }
}
