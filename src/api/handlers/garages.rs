use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{
        BusinessHours, CreateGarageRequest, Garage, GarageStats, GarageStatus,
        UpdateGarageRequest,
    },
    error::{AppError, Result},
};

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

#[derive(Debug, Serialize)]
pub struct GarageDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub business_hours: BusinessHours,
    pub status: GarageStatus,
    pub is_verified: bool,
    pub stats: GarageStats,
    pub created_at: String,
}

impl From<Garage> for GarageDto {
    fn from(garage: Garage) -> Self {
        Self {
            id: garage.id,
            owner_id: garage.owner_id,
            name: garage.name,
            description: garage.description,
            address: garage.address,
            city: garage.city,
            longitude: garage.longitude,
            latitude: garage.latitude,
            phone: garage.phone,
            email: garage.email,
            business_hours: garage.business_hours,
            status: garage.status,
            is_verified: garage.is_verified,
            stats: garage.stats,
            created_at: garage.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    garages: Vec<GarageDto>,
    total: usize,
}

/// Public directory of active garages.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let garages = state.service_context.garage_repo
        .list_active(params.limit, params.offset)
        .await?;

    let total = garages.len();
    let garages: Vec<GarageDto> = garages.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { garages, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GarageDto>> {
    let garage = state.service_context.garage_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

    Ok(Json(garage.into()))
}

pub async fn mine(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<GarageDto>> {
    let garage = state.service_context.garage_repo
        .find_by_owner(current.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("You have no garage".to_string()))?;

    Ok(Json(garage.into()))
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateGarageRequest>,
) -> Result<(StatusCode, Json<GarageDto>)> {
    let garage = state.service_context.garage_service
        .create(&current.user, request)
        .await?;

    Ok((StatusCode::CREATED, Json(garage.into())))
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateGarageRequest>,
) -> Result<Json<GarageDto>> {
    let garage = state.service_context.garage_service
        .update(&current.user, id, update)
        .await?;

    Ok(Json(garage.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.garage_service
        .soft_delete(&current.user, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
