use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::authorize_owner,
    domain::{CreateServiceRequest, Service, UpdateServiceRequest, User},
    error::{AppError, Result},
    repository::{BookingRepository, GarageRepository, ServiceRepository},
};

/// Manages a garage's service catalog.
pub struct CatalogService {
    repo: Arc<dyn ServiceRepository>,
    garage_repo: Arc<dyn GarageRepository>,
    booking_repo: Arc<dyn BookingRepository>,
}

impl CatalogService {
    pub fn new(
        repo: Arc<dyn ServiceRepository>,
        garage_repo: Arc<dyn GarageRepository>,
        booking_repo: Arc<dyn BookingRepository>,
    ) -> Self {
        Self { repo, garage_repo, booking_repo }
    }

    pub async fn create(
        &self,
        actor: &User,
        garage_id: Uuid,
        request: CreateServiceRequest,
    ) -> Result<Service> {
        let garage = self.garage_repo.find_by_id(garage_id).await?
            .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        authorize_owner(actor, &garage)?;

        validate_pricing(request.price_cents, request.duration_minutes)?;
        if request.name.trim().is_empty() {
            return Err(AppError::Validation("Service name is required".to_string()));
        }

        self.repo.create(garage_id, request).await
    }

    pub async fn update(
        &self,
        actor: &User,
        service_id: Uuid,
        update: UpdateServiceRequest,
    ) -> Result<Service> {
        let service = self.repo.find_by_id(service_id).await?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

        let garage = self.garage_repo.find_by_id(service.garage_id).await?
            .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        authorize_owner(actor, &garage)?;

        if let Some(price) = update.price_cents {
            validate_pricing(price, update.duration_minutes.unwrap_or(service.duration_minutes))?;
        } else if let Some(duration) = update.duration_minutes {
            validate_pricing(service.price_cents, duration)?;
        }

        self.repo.update(service_id, update).await
    }

    /// Soft delete, refused while the service still has upcoming bookings.
    pub async fn soft_delete(&self, actor: &User, service_id: Uuid) -> Result<()> {
        let service = self.repo.find_by_id(service_id).await?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

        let garage = self.garage_repo.find_by_id(service.garage_id).await?
            .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        authorize_owner(actor, &garage)?;

        let today = Utc::now().date_naive();
        let upcoming = self.booking_repo.upcoming_active_for_service(service_id, today).await?;
        if upcoming > 0 {
            return Err(AppError::Conflict(format!(
                "Service has {} upcoming bookings",
                upcoming
            )));
        }

        self.repo.soft_delete(service_id, actor.id).await
    }
}

fn validate_pricing(price_cents: i64, duration_minutes: i64) -> Result<()> {
    if price_cents < 0 {
        return Err(AppError::Validation("Price must not be negative".to_string()));
    }
    if duration_minutes <= 0 {
        return Err(AppError::Validation("Duration must be positive".to_string()));
    }
    Ok(())
}
