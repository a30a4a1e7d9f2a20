mod common;

use chrono::NaiveDate;
use garagehub::{
    domain::{BookingStatus, CreateBookingRequest, TimeSlot, VehicleInfo},
    error::AppError,
};

fn slot(start: &str, end: &str) -> TimeSlot {
    TimeSlot { start: start.to_string(), end: end.to_string() }
}

fn vehicle() -> VehicleInfo {
    VehicleInfo {
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        year: Some(2019),
        license_plate: Some("TST-0001".to_string()),
    }
}

// A Monday, comfortably inside the default 09:00-18:00 hours.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

fn booking_request(
    garage_id: uuid::Uuid,
    service_id: uuid::Uuid,
    time_slot: TimeSlot,
) -> CreateBookingRequest {
    CreateBookingRequest {
        garage_id,
        service_id,
        date: monday(),
        time_slot,
        vehicle: vehicle(),
        notes: None,
    }
}

#[tokio::test]
async fn test_full_booking_lifecycle() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    // The slot is free beforehand
    let availability = ctx.availability_service
        .check(garage.id, Some(service.id), monday(), &slot("09:00", "10:00"))
        .await?;
    assert!(availability.available);

    let booking = ctx.booking_service
        .create(&driver, booking_request(garage.id, service.id, slot("09:00", "10:00")))
        .await?;
    assert_eq!(booking.status, BookingStatus::Pending);

    let garage_after = ctx.garage_repo.find_by_id(garage.id).await?.unwrap();
    assert_eq!(garage_after.stats.total_bookings, 1);
    assert_eq!(garage_after.stats.completed_bookings, 0);

    // Garage owner walks the booking to completion
    let booking = ctx.booking_service
        .transition(&owner, booking.id, BookingStatus::Approved, None)
        .await?;
    assert_eq!(booking.status, BookingStatus::Approved);

    let booking = ctx.booking_service
        .transition(&owner, booking.id, BookingStatus::InProgress, None)
        .await?;
    let booking = ctx.booking_service
        .transition(&owner, booking.id, BookingStatus::Completed, None)
        .await?;
    assert_eq!(booking.status, BookingStatus::Completed);

    let garage_after = ctx.garage_repo.find_by_id(garage.id).await?.unwrap();
    assert_eq!(garage_after.stats.completed_bookings, 1);

    // History is append-only, in order, and ends at the current status
    let history = ctx.booking_repo.history(booking.id).await?;
    let statuses: Vec<BookingStatus> = history.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![
        BookingStatus::Pending,
        BookingStatus::Approved,
        BookingStatus::InProgress,
        BookingStatus::Completed,
    ]);
    assert_eq!(history.last().unwrap().status, booking.status);

    Ok(())
}

#[tokio::test]
async fn test_repeating_current_status_is_a_noop() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    let booking = ctx.booking_service
        .create(&driver, booking_request(garage.id, service.id, slot("09:00", "10:00")))
        .await?;

    let booking = ctx.booking_service
        .transition(&owner, booking.id, BookingStatus::Approved, None)
        .await?;
    let history_before = ctx.booking_repo.history(booking.id).await?;

    // Same target again: success, nothing changes
    let unchanged = ctx.booking_service
        .transition(&owner, booking.id, BookingStatus::Approved, None)
        .await?;
    assert_eq!(unchanged.status, BookingStatus::Approved);

    let history_after = ctx.booking_repo.history(booking.id).await?;
    assert_eq!(history_before.len(), history_after.len());

    Ok(())
}

#[tokio::test]
async fn test_invalid_transitions_are_rejected() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    let booking = ctx.booking_service
        .create(&driver, booking_request(garage.id, service.id, slot("09:00", "10:00")))
        .await?;

    // Skipping straight to completed is not an edge in the table
    let err = ctx.booking_service
        .transition(&owner, booking.id, BookingStatus::Completed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    // Car owners may not drive transitions at all
    let err = ctx.booking_service
        .transition(&driver, booking.id, BookingStatus::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn test_car_owner_cancellation_rules() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;
    let stranger = common::create_car_owner(&ctx, "stranger@test.local").await?;

    // Cancel from pending works
    let booking = ctx.booking_service
        .create(&driver, booking_request(garage.id, service.id, slot("09:00", "10:00")))
        .await?;
    let err = ctx.booking_service.cancel(&stranger, booking.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let cancelled = ctx.booking_service.cancel(&driver, booking.id, None).await?;
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    // A cancelled booking frees the slot for someone else
    let rebooked = ctx.booking_service
        .create(&stranger, booking_request(garage.id, service.id, slot("09:00", "10:00")))
        .await?;

    // Once work started, the car owner can no longer cancel
    ctx.booking_service.transition(&owner, rebooked.id, BookingStatus::Approved, None).await?;
    ctx.booking_service.transition(&owner, rebooked.id, BookingStatus::InProgress, None).await?;
    let err = ctx.booking_service.cancel(&stranger, rebooked.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    Ok(())
}

#[tokio::test]
async fn test_garage_stats_track_bookings_and_soft_deletes() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    let slots = [("09:00", "10:00"), ("10:00", "11:00"), ("11:00", "12:00")];
    let mut bookings = Vec::new();
    for (start, end) in slots {
        bookings.push(
            ctx.booking_service
                .create(&driver, booking_request(garage.id, service.id, slot(start, end)))
                .await?,
        );
    }

    let first = bookings[0].id;
    ctx.booking_service.transition(&owner, first, BookingStatus::Approved, None).await?;
    ctx.booking_service.transition(&owner, first, BookingStatus::InProgress, None).await?;
    ctx.booking_service.transition(&owner, first, BookingStatus::Completed, None).await?;

    let garage_after = ctx.garage_repo.find_by_id(garage.id).await?.unwrap();
    assert_eq!(garage_after.stats.total_bookings, 3);
    assert_eq!(garage_after.stats.completed_bookings, 1);

    // Soft-deleting the completed booking gives its counter back, floored
    // at zero
    ctx.booking_service.soft_delete(&admin, first).await?;
    let garage_after = ctx.garage_repo.find_by_id(garage.id).await?.unwrap();
    assert_eq!(garage_after.stats.total_bookings, 3);
    assert_eq!(garage_after.stats.completed_bookings, 0);

    assert!(ctx.booking_repo.find_by_id(first).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_concurrent_creates_for_same_slot_only_one_wins() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let alice = common::create_car_owner(&ctx, "alice@test.local").await?;
    let bob = common::create_car_owner(&ctx, "bob@test.local").await?;

    let (a, b) = tokio::join!(
        ctx.booking_service.create(&alice, booking_request(garage.id, service.id, slot("09:00", "10:00"))),
        ctx.booking_service.create(&bob, booking_request(garage.id, service.id, slot("09:00", "10:00"))),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one of two racing creates must win");

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser.unwrap_err(), AppError::Conflict(_)));

    let garage_after = ctx.garage_repo.find_by_id(garage.id).await?.unwrap();
    assert_eq!(garage_after.stats.total_bookings, 1);

    Ok(())
}
