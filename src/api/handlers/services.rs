use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateServiceRequest, Service, ServiceCategory, UpdateServiceRequest},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct ServiceDto {
    pub id: Uuid,
    pub garage_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub price_cents: i64,
    pub duration_minutes: i64,
    pub is_available: bool,
}

impl From<Service> for ServiceDto {
    fn from(service: Service) -> Self {
        Self {
            id: service.id,
            garage_id: service.garage_id,
            name: service.name,
            description: service.description,
            category: service.category,
            price_cents: service.price_cents,
            duration_minutes: service.duration_minutes,
            is_available: service.is_available,
        }
    }
}

/// Public listing of a garage's catalog.
pub async fn list_by_garage(
    State(state): State<AppState>,
    Path(garage_id): Path<Uuid>,
) -> Result<Json<Vec<ServiceDto>>> {
    let services = state.service_context.service_repo
        .list_by_garage(garage_id)
        .await?;

    Ok(Json(services.into_iter().map(Into::into).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(garage_id): Path<Uuid>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ServiceDto>)> {
    let service = state.service_context.catalog_service
        .create(&current.user, garage_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(service.into())))
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateServiceRequest>,
) -> Result<Json<ServiceDto>> {
    let service = state.service_context.catalog_service
        .update(&current.user, id, update)
        .await?;

    Ok(Json(service.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.catalog_service
        .soft_delete(&current.user, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
