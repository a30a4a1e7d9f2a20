mod common;

use chrono::NaiveDate;
use garagehub::{
    domain::{
        BookingStatus, CreateBookingRequest, PaymentPurpose, PaymentStatus,
        TimeSlot, VehicleInfo,
    },
    error::AppError,
};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

#[tokio::test]
async fn test_booking_payment_settles_and_auto_approves_once() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    let booking = ctx.booking_service.create(&driver, CreateBookingRequest {
        garage_id: garage.id,
        service_id: service.id,
        date: monday(),
        time_slot: TimeSlot { start: "09:00".to_string(), end: "10:00".to_string() },
        vehicle: VehicleInfo {
            make: "Subaru".to_string(),
            model: "Outback".to_string(),
            year: None,
            license_plate: None,
        },
        notes: None,
    }).await?;
    assert_eq!(booking.status, BookingStatus::Pending);

    let payment = ctx.payment_service
        .record_manual(
            &admin,
            driver.id,
            PaymentPurpose::Booking,
            Some(booking.id),
            Some(garage.id),
            4999,
            "Oil change payment".to_string(),
            false,
        )
        .await?;
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.paid_at.is_some());

    let booking_after = ctx.booking_repo.find_by_id(booking.id).await?.unwrap();
    assert!(booking_after.is_paid);
    assert_eq!(booking_after.status, BookingStatus::Approved);
    assert_eq!(booking_after.payment_id, Some(payment.id));

    // Duplicate settlement delivery is a no-op
    let again = ctx.payment_service.on_payment_settled(payment.id).await?;
    assert_eq!(again.status, PaymentStatus::Completed);

    let booking_after = ctx.booking_repo.find_by_id(booking.id).await?.unwrap();
    assert_eq!(booking_after.status, BookingStatus::Approved);

    let history = ctx.booking_repo.history(booking.id).await?;
    let approvals = history.iter()
        .filter(|e| e.status == BookingStatus::Approved)
        .count();
    assert_eq!(approvals, 1, "duplicate settlement must not append history");

    Ok(())
}

#[tokio::test]
async fn test_refund_reverses_booking_effects() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    let booking = ctx.booking_service.create(&driver, CreateBookingRequest {
        garage_id: garage.id,
        service_id: service.id,
        date: monday(),
        time_slot: TimeSlot { start: "10:00".to_string(), end: "11:00".to_string() },
        vehicle: VehicleInfo {
            make: "VW".to_string(),
            model: "Golf".to_string(),
            year: None,
            license_plate: None,
        },
        notes: None,
    }).await?;

    let payment = ctx.payment_service
        .record_manual(
            &admin,
            driver.id,
            PaymentPurpose::Booking,
            Some(booking.id),
            Some(garage.id),
            4999,
            "Oil change payment".to_string(),
            false,
        )
        .await?;

    let refunded = ctx.payment_service.refund(&admin, payment.id).await?;
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    let booking_after = ctx.booking_repo.find_by_id(booking.id).await?.unwrap();
    assert!(!booking_after.is_paid);
    assert_eq!(booking_after.status, BookingStatus::Cancelled);

    // Refund is idempotent too
    let again = ctx.payment_service.on_payment_refunded(payment.id).await?;
    assert_eq!(again.status, PaymentStatus::Refunded);

    Ok(())
}

#[tokio::test]
async fn test_refund_window_applies_to_non_admins() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    let payment = ctx.payment_service
        .record_manual(
            &admin,
            driver.id,
            PaymentPurpose::GarageCreation,
            None,
            None,
            5000,
            "Registration fee".to_string(),
            false,
        )
        .await?;

    // Age the payment past the 30-day window
    let old = (chrono::Utc::now() - chrono::Duration::days(31)).naive_utc();
    sqlx::query("UPDATE payments SET paid_at = ? WHERE id = ?")
        .bind(old)
        .bind(payment.id.to_string())
        .execute(&ctx.db_pool)
        .await?;

    let err = ctx.payment_service.refund(&driver, payment.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Admins are exempt from the window
    let refunded = ctx.payment_service.refund(&admin, payment.id).await?;
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    Ok(())
}

#[tokio::test]
async fn test_garage_creation_payment_grants_and_revokes_entitlement() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;

    // A fresh garage owner without the entitlement
    let owner = ctx.user_repo.create(garagehub::domain::CreateUserRequest {
        email: "newowner@test.local".to_string(),
        full_name: "New Owner".to_string(),
        phone: None,
        password: "owner-password".to_string(),
        role: garagehub::domain::UserRole::GarageOwner,
    }).await?;
    assert!(!owner.can_create_garage);

    let payment = ctx.payment_service
        .record_manual(
            &admin,
            owner.id,
            PaymentPurpose::GarageCreation,
            None,
            None,
            5000,
            "Registration fee".to_string(),
            false,
        )
        .await?;
    assert_eq!(payment.status, PaymentStatus::Completed);

    let owner = ctx.user_repo.find_by_id(owner.id).await?.unwrap();
    assert!(owner.can_create_garage);

    // The refund takes it back
    ctx.payment_service.refund(&admin, payment.id).await?;
    let owner = ctx.user_repo.find_by_id(owner.id).await?.unwrap();
    assert!(!owner.can_create_garage);

    Ok(())
}

#[tokio::test]
async fn test_unpaid_garage_owner_cannot_register_a_garage() -> anyhow::Result<()> {
    let ctx = common::setup().await?;

    let owner = ctx.user_repo.create(garagehub::domain::CreateUserRequest {
        email: "unpaid@test.local".to_string(),
        full_name: "Unpaid Owner".to_string(),
        phone: None,
        password: "owner-password".to_string(),
        role: garagehub::domain::UserRole::GarageOwner,
    }).await?;

    let err = ctx.garage_service.create(&owner, garagehub::domain::CreateGarageRequest {
        name: "No Pay Garage".to_string(),
        description: None,
        address: "2 Test Street".to_string(),
        city: None,
        longitude: 0.0,
        latitude: 0.0,
        phone: None,
        email: None,
        business_hours: None,
    }).await.unwrap_err();
    assert!(matches!(err, AppError::Payment(_)));

    Ok(())
}
