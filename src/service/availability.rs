use chrono::{Datelike, NaiveDate};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    domain::{Availability, BusinessHours, TimeSlot},
    error::{AppError, Result},
};

/// Read-only slot availability queries. The booking-creation path runs the
/// same checks again inside its transaction, with the partial unique index
/// on bookings as the backstop for races the pre-check can't see.
pub struct AvailabilityService {
    pool: SqlitePool,
}

impl AvailabilityService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn check(
        &self,
        garage_id: Uuid,
        service_id: Option<Uuid>,
        date: NaiveDate,
        slot: &TimeSlot,
    ) -> Result<Availability> {
        let hours_json = sqlx::query_scalar::<_, String>(
            "SELECT business_hours FROM garages WHERE id = ? AND is_deleted = 0"
        )
        .bind(garage_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Garage not found".to_string()))?;

        let hours: BusinessHours = serde_json::from_str(&hours_json)
            .map_err(|e| AppError::Database(format!("Invalid business hours: {}", e)))?;

        if let Some(blocked) = check_business_hours(&hours, date, slot)? {
            return Ok(blocked);
        }

        if slot_taken(&self.pool, garage_id, date, slot).await? {
            return Ok(Availability::blocked("slot already booked"));
        }

        if let Some(service_id) = service_id {
            let row = sqlx::query_as::<_, (String, i64)>(
                "SELECT garage_id, duration_minutes FROM services WHERE id = ? AND is_deleted = 0"
            )
            .bind(service_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

            let (service_garage, duration_minutes) = row;
            if service_garage != garage_id.to_string() {
                return Err(AppError::Validation(
                    "Service does not belong to this garage".to_string(),
                ));
            }

            if let Some(blocked) = check_duration(slot, duration_minutes) {
                return Ok(blocked);
            }
        }

        Ok(Availability::open())
    }
}

/// Business-hours check shared between the public availability query and the
/// booking-creation transaction. Returns `Ok(Some(_))` when the slot is
/// blocked, `Ok(None)` when it fits.
pub(crate) fn check_business_hours(
    hours: &BusinessHours,
    date: NaiveDate,
    slot: &TimeSlot,
) -> Result<Option<Availability>> {
    let (start, end) = slot.as_minutes().ok_or_else(|| {
        AppError::Validation(
            "Time slot must be zero-padded HH:MM with start before end".to_string(),
        )
    })?;

    let day = hours.for_weekday(date.weekday());
    if day.closed {
        return Ok(Some(Availability::blocked("closed this day")));
    }

    let open = crate::domain::minutes_of_day(&day.open)
        .ok_or_else(|| AppError::Database(format!("Invalid opening time '{}'", day.open)))?;
    let close = crate::domain::minutes_of_day(&day.close)
        .ok_or_else(|| AppError::Database(format!("Invalid closing time '{}'", day.close)))?;

    if start < open || end > close {
        return Ok(Some(Availability::blocked("outside business hours")));
    }

    Ok(None)
}

/// Duration-fit check. `Some` when the slot is too short for the service.
pub(crate) fn check_duration(slot: &TimeSlot, service_duration_minutes: i64) -> Option<Availability> {
    let slot_minutes = i64::from(slot.duration_minutes()?);
    if slot_minutes < service_duration_minutes {
        return Some(Availability::blocked(format!(
            "slot duration {} minutes is shorter than service duration {} minutes",
            slot_minutes, service_duration_minutes
        )));
    }
    None
}

/// True when a live booking already occupies the exact (garage, date, slot)
/// tuple. Runs against the pool for the public query and against an open
/// transaction during creation.
pub(crate) async fn slot_taken<'e, E>(
    executor: E,
    garage_id: Uuid,
    date: NaiveDate,
    slot: &TimeSlot,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM bookings
        WHERE garage_id = ? AND date = ? AND start_time = ? AND end_time = ?
          AND status NOT IN ('cancelled', 'rejected')
          AND is_deleted = 0
        "#
    )
    .bind(garage_id.to_string())
    .bind(date)
    .bind(&slot.start)
    .bind(&slot.end)
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BusinessHours;

    fn slot(start: &str, end: &str) -> TimeSlot {
        TimeSlot { start: start.to_string(), end: end.to_string() }
    }

    // 2024-06-10 is a Monday; default hours are 09:00-18:00 weekdays,
    // closed Sunday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()
    }

    #[test]
    fn slot_matching_open_and_close_exactly_is_allowed() {
        let hours = BusinessHours::default();
        let result = check_business_hours(&hours, monday(), &slot("09:00", "18:00")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn slot_one_minute_outside_hours_is_blocked() {
        let hours = BusinessHours::default();

        let early = check_business_hours(&hours, monday(), &slot("08:59", "10:00"))
            .unwrap()
            .expect("should be blocked");
        assert_eq!(early.reason.as_deref(), Some("outside business hours"));

        let late = check_business_hours(&hours, monday(), &slot("17:00", "18:01"))
            .unwrap()
            .expect("should be blocked");
        assert_eq!(late.reason.as_deref(), Some("outside business hours"));
    }

    #[test]
    fn closed_day_is_blocked_regardless_of_times() {
        let hours = BusinessHours::default();
        let result = check_business_hours(&hours, sunday(), &slot("09:00", "10:00"))
            .unwrap()
            .expect("should be blocked");
        assert_eq!(result.reason.as_deref(), Some("closed this day"));
    }

    #[test]
    fn malformed_slot_is_a_validation_error() {
        let hours = BusinessHours::default();
        assert!(check_business_hours(&hours, monday(), &slot("9am", "10:00")).is_err());
        assert!(check_business_hours(&hours, monday(), &slot("10:00", "09:00")).is_err());
    }

    #[test]
    fn short_slot_reports_both_durations() {
        let blocked = check_duration(&slot("09:00", "09:30"), 60).expect("should be blocked");
        let reason = blocked.reason.unwrap();
        assert!(reason.contains("30"));
        assert!(reason.contains("60"));

        assert!(check_duration(&slot("09:00", "10:00"), 60).is_none());
    }
}
