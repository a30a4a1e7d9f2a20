mod common;

use chrono::NaiveDate;
use garagehub::{
    domain::{CreateBookingRequest, TimeSlot, VehicleInfo},
    error::AppError,
};
use uuid::Uuid;

fn slot(start: &str, end: &str) -> TimeSlot {
    TimeSlot { start: start.to_string(), end: end.to_string() }
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

fn sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()
}

#[tokio::test]
async fn test_boundary_slots_against_business_hours() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;

    // Exactly open-to-close is allowed
    let result = ctx.availability_service
        .check(garage.id, None, monday(), &slot("09:00", "18:00"))
        .await?;
    assert!(result.available);

    // One minute early or late is not
    let result = ctx.availability_service
        .check(garage.id, None, monday(), &slot("08:59", "10:00"))
        .await?;
    assert!(!result.available);
    assert_eq!(result.reason.as_deref(), Some("outside business hours"));

    let result = ctx.availability_service
        .check(garage.id, None, monday(), &slot("17:30", "18:01"))
        .await?;
    assert!(!result.available);
    assert_eq!(result.reason.as_deref(), Some("outside business hours"));

    Ok(())
}

#[tokio::test]
async fn test_closed_day_blocks_any_slot() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;

    // Default hours close the garage on Sundays
    let result = ctx.availability_service
        .check(garage.id, None, sunday(), &slot("10:00", "11:00"))
        .await?;
    assert!(!result.available);
    assert_eq!(result.reason.as_deref(), Some("closed this day"));

    Ok(())
}

#[tokio::test]
async fn test_taken_slot_is_reported() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    ctx.booking_service.create(&driver, CreateBookingRequest {
        garage_id: garage.id,
        service_id: service.id,
        date: monday(),
        time_slot: slot("09:00", "10:00"),
        vehicle: VehicleInfo {
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            year: None,
            license_plate: None,
        },
        notes: None,
    }).await?;

    let result = ctx.availability_service
        .check(garage.id, None, monday(), &slot("09:00", "10:00"))
        .await?;
    assert!(!result.available);
    assert_eq!(result.reason.as_deref(), Some("slot already booked"));

    Ok(())
}

#[tokio::test]
async fn test_slot_shorter_than_service_duration() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Engine Diagnostic", 90).await?;

    let result = ctx.availability_service
        .check(garage.id, Some(service.id), monday(), &slot("09:00", "10:00"))
        .await?;
    assert!(!result.available);
    let reason = result.reason.unwrap();
    assert!(reason.contains("60"), "reason should name the slot duration: {reason}");
    assert!(reason.contains("90"), "reason should name the service duration: {reason}");

    // A slot that fits the duration passes
    let result = ctx.availability_service
        .check(garage.id, Some(service.id), monday(), &slot("09:00", "10:30"))
        .await?;
    assert!(result.available);

    Ok(())
}

#[tokio::test]
async fn test_unknown_garage_is_not_found() -> anyhow::Result<()> {
    let ctx = common::setup().await?;

    let err = ctx.availability_service
        .check(Uuid::new_v4(), None, monday(), &slot("09:00", "10:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}
