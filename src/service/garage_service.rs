use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::authorize_owner,
    domain::{CreateGarageRequest, Garage, GarageStatus, UpdateGarageRequest, User, UserRole},
    error::{AppError, Result},
    repository::{BookingRepository, GarageRepository},
};

pub struct GarageService {
    repo: Arc<dyn GarageRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    pool: SqlitePool,
}

impl GarageService {
    pub fn new(
        repo: Arc<dyn GarageRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        pool: SqlitePool,
    ) -> Self {
        Self { repo, booking_repo, pool }
    }

    /// Registers a new garage in `pending` state. Garage owners need a
    /// settled registration payment first; admins can create directly.
    pub async fn create(&self, actor: &User, request: CreateGarageRequest) -> Result<Garage> {
        if actor.role == UserRole::CarOwner {
            return Err(AppError::Forbidden);
        }
        if !actor.is_admin() && !actor.can_create_garage {
            return Err(AppError::Payment(
                "Garage registration requires a completed registration payment".to_string(),
            ));
        }

        if !(-180.0..=180.0).contains(&request.longitude) {
            return Err(AppError::Validation("Longitude must be between -180 and 180".to_string()));
        }
        if !(-90.0..=90.0).contains(&request.latitude) {
            return Err(AppError::Validation("Latitude must be between -90 and 90".to_string()));
        }
        if request.name.trim().is_empty() {
            return Err(AppError::Validation("Garage name is required".to_string()));
        }
        if let Some(hours) = &request.business_hours {
            hours.validate().map_err(AppError::Validation)?;
        }

        if self.repo.find_by_owner(actor.id).await?.is_some() {
            return Err(AppError::Conflict("Owner already has a garage".to_string()));
        }

        let garage = self.repo.create(actor.id, request).await?;

        tracing::info!(garage_id = %garage.id, owner_id = %actor.id, "garage registered");

        Ok(garage)
    }

    pub async fn update(&self, actor: &User, garage_id: Uuid, update: UpdateGarageRequest) -> Result<Garage> {
        let garage = self.repo.find_by_id(garage_id).await?
            .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        authorize_owner(actor, &garage)?;

        if let Some(hours) = &update.business_hours {
            hours.validate().map_err(AppError::Validation)?;
        }

        self.repo.update(garage_id, update).await
    }

    /// Admin verification is the only path to `active`; a settled
    /// registration payment alone leaves the garage pending.
    pub async fn verify(&self, actor: &User, garage_id: Uuid, approve: bool) -> Result<Garage> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let status = if approve { GarageStatus::Active } else { GarageStatus::Suspended };
        let garage = self.repo.set_status(garage_id, status, approve).await?;

        tracing::info!(garage_id = %garage_id, status = %status.as_str(), "garage verification updated");

        Ok(garage)
    }

    pub async fn suspend(&self, actor: &User, garage_id: Uuid) -> Result<Garage> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        self.repo.set_status(garage_id, GarageStatus::Suspended, false).await
    }

    /// Soft-deletes the garage. Blocked while upcoming bookings still hold
    /// slots, so open commitments aren't silently orphaned.
    pub async fn soft_delete(&self, actor: &User, garage_id: Uuid) -> Result<()> {
        let garage = self.repo.find_by_id(garage_id).await?
            .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        authorize_owner(actor, &garage)?;

        let today = Utc::now().date_naive();
        let upcoming = self.booking_repo.upcoming_active_for_garage(garage_id, today).await?;
        if upcoming > 0 {
            return Err(AppError::Conflict(format!(
                "Garage has {} upcoming bookings",
                upcoming
            )));
        }

        self.repo.soft_delete(garage_id, actor.id).await
    }

    /// Wholesale recount of the garage aggregates, for reconciliation only —
    /// the normal paths maintain the counters incrementally. Total bookings
    /// counts every row ever created (soft deletes don't give it back);
    /// completed and review figures track live rows.
    pub async fn reconcile_stats(&self, actor: &User, garage_id: Uuid) -> Result<Garage> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let garage_id_str = garage_id.to_string();
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE garages SET
                total_bookings = (
                    SELECT COUNT(*) FROM bookings WHERE garage_id = ?
                ),
                completed_bookings = (
                    SELECT COUNT(*) FROM bookings
                    WHERE garage_id = ? AND status = 'completed' AND is_deleted = 0
                ),
                total_reviews = (
                    SELECT COUNT(*) FROM reviews WHERE garage_id = ? AND is_deleted = 0
                ),
                average_rating = COALESCE((
                    SELECT AVG(rating) FROM reviews WHERE garage_id = ? AND is_deleted = 0
                ), 0),
                updated_at = ?
            WHERE id = ? AND is_deleted = 0
            "#
        )
        .bind(&garage_id_str)
        .bind(&garage_id_str)
        .bind(&garage_id_str)
        .bind(&garage_id_str)
        .bind(now)
        .bind(&garage_id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Garage not found".to_string()));
        }

        self.repo.find_by_id(garage_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve reconciled garage".to_string())
        })
    }
}
