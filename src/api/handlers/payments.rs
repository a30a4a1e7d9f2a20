use axum::{
    extract::{Path, State},
    http::HeaderMap,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    auth::authorize_owner,
    domain::{Payment, PaymentMethod, PaymentPurpose, PaymentStatus},
    error::{AppError, Result},
};

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: PaymentPurpose,
    pub booking_id: Option<Uuid>,
    pub garage_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub description: String,
    pub paid_at: Option<String>,
    pub created_at: String,
}

impl From<Payment> for PaymentDto {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            user_id: payment.user_id,
            purpose: payment.purpose,
            booking_id: payment.booking_id,
            garage_id: payment.garage_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            status: payment.status,
            payment_method: payment.payment_method,
            description: payment.description,
            paid_at: payment.paid_at.map(|dt| dt.to_rfc3339()),
            created_at: payment.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// Opens a provider checkout for an existing booking.
pub async fn booking_checkout(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>> {
    let stripe = state.stripe_client.as_ref().ok_or_else(|| {
        AppError::Payment("Online payments are not enabled".to_string())
    })?;

    let booking = state.service_context.booking_repo
        .find_by_id(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    authorize_owner(&current.user, &booking)?;

    if booking.is_paid {
        return Err(AppError::Conflict("Booking is already paid".to_string()));
    }
    if booking.status.is_terminal() {
        return Err(AppError::Validation(
            "Terminal bookings cannot be paid".to_string(),
        ));
    }

    let service = state.service_context.service_repo
        .find_by_id(booking.service_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

    let base = &state.settings.server.base_url;
    let url = stripe
        .create_booking_checkout_session(
            &current.user,
            &booking,
            &service.name,
            service.price_cents,
            format!("{}/payments/success", base),
            format!("{}/payments/cancelled", base),
        )
        .await?;

    Ok(Json(CheckoutResponse { checkout_url: url }))
}

/// Opens a checkout for the one-time garage registration fee.
pub async fn garage_checkout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<CheckoutResponse>> {
    let stripe = state.stripe_client.as_ref().ok_or_else(|| {
        AppError::Payment("Online payments are not enabled".to_string())
    })?;

    if current.user.can_create_garage {
        return Err(AppError::Conflict(
            "Garage registration is already paid for".to_string(),
        ));
    }

    let base = &state.settings.server.base_url;
    let url = stripe
        .create_garage_checkout_session(
            &current.user,
            state.settings.stripe.garage_creation_fee_cents,
            format!("{}/payments/success", base),
            format!("{}/payments/cancelled", base),
        )
        .await?;

    Ok(Json(CheckoutResponse { checkout_url: url }))
}

/// Provider webhook endpoint. Unauthenticated; trust comes from the
/// signature check inside `handle_webhook`.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let stripe = state.stripe_client.as_ref().ok_or_else(|| {
        AppError::Payment("Online payments are not enabled".to_string())
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing stripe-signature header".to_string()))?;

    stripe.handle_webhook(&body, signature).await?;

    Ok(StatusCode::OK)
}

/// Manual verification fallback: asks the provider for the payment's state
/// and applies the same settlement the webhook would have.
pub async fn verify(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentDto>> {
    let stripe = state.stripe_client.as_ref().ok_or_else(|| {
        AppError::Payment("Online payments are not enabled".to_string())
    })?;

    let payment = state.service_context.payment_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    authorize_owner(&current.user, &payment)?;

    let updated = stripe.verify_payment(&payment).await?;

    Ok(Json(updated.into()))
}

pub async fn refund(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentDto>> {
    let payment = state.service_context.payment_service
        .refund(&current.user, id)
        .await?;

    Ok(Json(payment.into()))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentDto>> {
    let payment = state.service_context.payment_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    authorize_owner(&current.user, &payment)?;

    Ok(Json(payment.into()))
}

pub async fn list_mine(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<PaymentDto>>> {
    let payments = state.service_context.payment_repo
        .list_by_user(current.user.id)
        .await?;

    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ManualPaymentRequest {
    pub user_id: Uuid,
    pub purpose: PaymentPurpose,
    pub booking_id: Option<Uuid>,
    pub garage_id: Option<Uuid>,
    pub amount_cents: i64,
    pub description: String,
    #[serde(default)]
    pub waived: bool,
}
