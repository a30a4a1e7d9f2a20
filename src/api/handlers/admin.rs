use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    api::{
        handlers::auth::UserDto,
        handlers::garages::GarageDto,
        handlers::payments::{ManualPaymentRequest, PaymentDto},
        middleware::auth::CurrentUser,
        state::AppState,
    },
    error::Result,
    storage,
};

/// Platform-wide booking statistics.
pub async fn stats(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<serde_json::Value>> {
    let bookings = state.service_context.booking_repo.statistics(None).await?;

    Ok(Json(json!({
        "bookings": bookings,
        "generated_at": chrono::Utc::now().to_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_users(
    State(state): State<AppState>,
    _current: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<UserDto>>> {
    let users = state.service_context.user_repo
        .list(params.limit, params.offset)
        .await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Hard purge of an account and its dependent records. Attachment files are
/// cleaned up best-effort: a failed file delete is logged, never surfaced.
pub async fn purge_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let orphaned_files = state.service_context.user_service
        .hard_delete(&current.user, id)
        .await?;

    for path in orphaned_files {
        if let Err(e) = storage::delete_uploaded_file(&path).await {
            tracing::warn!(path = %path, error = %e, "failed to remove orphaned attachment");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_garages(
    State(state): State<AppState>,
    _current: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<GarageDto>>> {
    let garages = state.service_context.garage_repo
        .list(params.limit, params.offset)
        .await?;

    Ok(Json(garages.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct VerifyGarageRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyGarageResponse {
    pub garage: GarageDto,
}

/// The only path that activates a garage; payment alone never does.
pub async fn verify_garage(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<VerifyGarageRequest>,
) -> Result<Json<VerifyGarageResponse>> {
    let garage = state.service_context.garage_service
        .verify(&current.user, id, req.approve)
        .await?;

    Ok(Json(VerifyGarageResponse { garage: garage.into() }))
}

pub async fn reconcile_garage_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GarageDto>> {
    let garage = state.service_context.garage_service
        .reconcile_stats(&current.user, id)
        .await?;

    Ok(Json(garage.into()))
}

pub async fn record_manual_payment(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ManualPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentDto>)> {
    let payment = state.service_context.payment_service
        .record_manual(
            &current.user,
            req.user_id,
            req.purpose,
            req.booking_id,
            req.garage_id,
            req.amount_cents,
            req.description,
            req.waived,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}
