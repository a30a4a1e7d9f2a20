use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{
        Availability, Booking, BookingStatistics, BookingStatus, CreateBookingRequest,
        StatusHistoryEntry, TimeSlot, User, UserRole, VehicleInfo,
    },
    error::{AppError, Result},
    storage,
};

#[derive(Debug, Serialize)]
pub struct BookingDto {
    pub id: Uuid,
    pub car_owner_id: Uuid,
    pub garage_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: BookingStatus,
    pub vehicle: VehicleInfo,
    pub notes: Option<String>,
    pub attachments: Vec<String>,
    pub is_paid: bool,
    pub created_at: String,
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            car_owner_id: booking.car_owner_id,
            garage_id: booking.garage_id,
            service_id: booking.service_id,
            date: booking.date,
            time_slot: booking.time_slot,
            status: booking.status,
            vehicle: booking.vehicle,
            notes: booking.notes,
            attachments: booking.attachments,
            is_paid: booking.is_paid,
            created_at: booking.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub service_id: Option<Uuid>,
}

/// Public availability query; read-only, so no principal is required.
pub async fn check_availability(
    State(state): State<AppState>,
    Path(garage_id): Path<Uuid>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Availability>> {
    let slot = TimeSlot { start: params.start, end: params.end };
    let availability = state.service_context.availability_service
        .check(garage_id, params.service_id, params.date, &slot)
        .await?;

    Ok(Json(availability))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingDto {
    pub garage_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub vehicle: VehicleInfo,
    pub notes: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(dto): Json<CreateBookingDto>,
) -> Result<(StatusCode, Json<BookingDto>)> {
    let booking = state.service_context.booking_service
        .create(&current.user, CreateBookingRequest {
            garage_id: dto.garage_id,
            service_id: dto.service_id,
            date: dto.date,
            time_slot: dto.time_slot,
            vehicle: dto.vehicle,
            notes: dto.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    garage_id: Option<Uuid>,
}

fn default_limit() -> i64 {
    50
}

/// Role-scoped listing: car owners see their bookings, garage owners their
/// garage's, admins whichever garage they ask for.
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BookingDto>>> {
    let bookings = match current.user.role {
        UserRole::CarOwner => {
            state.service_context.booking_repo
                .list_by_car_owner(current.user.id, params.limit, params.offset)
                .await?
        }
        UserRole::GarageOwner => {
            let garage = state.service_context.garage_repo
                .find_by_owner(current.user.id)
                .await?
                .ok_or_else(|| AppError::NotFound("You have no garage".to_string()))?;
            state.service_context.booking_repo
                .list_by_garage(garage.id, params.limit, params.offset)
                .await?
        }
        UserRole::Admin => {
            let garage_id = params.garage_id.ok_or_else(|| {
                AppError::BadRequest("garage_id is required for admin listings".to_string())
            })?;
            state.service_context.booking_repo
                .list_by_garage(garage_id, params.limit, params.offset)
                .await?
        }
    };

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = load_visible(&state, &current.user, id).await?;
    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

pub async fn transition(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<BookingDto>> {
    let booking = state.service_context.booking_service
        .transition(&current.user, id, req.status, req.reason)
        .await?;

    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<BookingDto>> {
    let booking = state.service_context.booking_service
        .cancel(&current.user, id, req.reason)
        .await?;

    Ok(Json(booking.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.booking_service
        .soft_delete(&current.user, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct TimelineEntryDto {
    pub status: BookingStatus,
    pub changed_by: Uuid,
    pub reason: String,
    pub timestamp: String,
}

impl From<StatusHistoryEntry> for TimelineEntryDto {
    fn from(entry: StatusHistoryEntry) -> Self {
        Self {
            status: entry.status,
            changed_by: entry.changed_by,
            reason: entry.reason,
            timestamp: entry.created_at.to_rfc3339(),
        }
    }
}

pub async fn timeline(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEntryDto>>> {
    // Visibility follows the booking itself.
    load_visible(&state, &current.user, id).await?;

    let history = state.service_context.booking_repo.history(id).await?;

    Ok(Json(history.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CalendarParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Date-range calendar for a garage, for the garage owner or an admin.
pub async fn calendar(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(garage_id): Path<Uuid>,
    Query(params): Query<CalendarParams>,
) -> Result<Json<Vec<BookingDto>>> {
    let garage = state.service_context.garage_repo
        .find_by_id(garage_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

    crate::auth::authorize_owner(&current.user, &garage)?;

    if params.from > params.to {
        return Err(AppError::Validation("'from' must not be after 'to'".to_string()));
    }

    let bookings = state.service_context.booking_repo
        .list_by_garage_date_range(garage_id, params.from, params.to)
        .await?;

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    garage_id: Option<Uuid>,
}

pub async fn stats(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<StatsParams>,
) -> Result<Json<BookingStatistics>> {
    let garage_id = match current.user.role {
        UserRole::Admin => params.garage_id,
        UserRole::GarageOwner => {
            let garage = state.service_context.garage_repo
                .find_by_owner(current.user.id)
                .await?
                .ok_or_else(|| AppError::NotFound("You have no garage".to_string()))?;
            Some(garage.id)
        }
        UserRole::CarOwner => return Err(AppError::Forbidden),
    };

    let stats = state.service_context.booking_repo.statistics(garage_id).await?;

    Ok(Json(stats))
}

/// Multipart attachment upload. The stored path is appended to the
/// booking's reference list; the bytes live in the uploads directory.
pub async fn upload_attachment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<BookingDto>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
        .ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    let filename = field
        .file_name()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Validation("Missing filename".to_string()))?;

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

    let path = storage::save_uploaded_file(&state.settings.uploads.dir, &filename, &data).await?;

    let booking = state.service_context.booking_service
        .add_attachment(&current.user, id, path)
        .await?;

    Ok(Json(booking.into()))
}

/// Loads a booking the current user is allowed to see: its car owner, the
/// owner of its garage, or an admin.
async fn load_visible(state: &AppState, user: &User, booking_id: Uuid) -> Result<Booking> {
    let booking = state.service_context.booking_repo
        .find_by_id(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if user.is_admin() || booking.car_owner_id == user.id {
        return Ok(booking);
    }

    if user.role == UserRole::GarageOwner {
        if let Some(garage) = state.service_context.garage_repo.find_by_id(booking.garage_id).await? {
            if garage.owner_id == user.id {
                return Ok(booking);
            }
        }
    }

    // Hide existence from everyone else.
    Err(AppError::NotFound("Booking not found".to_string()))
}
