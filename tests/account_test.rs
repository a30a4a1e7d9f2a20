mod common;

use chrono::NaiveDate;
use garagehub::{
    domain::{CreateBookingRequest, CreateUserRequest, TimeSlot, UserRole, VehicleInfo},
    error::AppError,
};

#[tokio::test]
async fn test_login_rate_limit_is_counted_in_the_store() -> anyhow::Result<()> {
    let ctx = common::setup().await?;

    let key = "login:driver@test.local";
    for _ in 0..5 {
        ctx.rate_limit_service.hit(key, 5, 900).await?;
    }

    let err = ctx.rate_limit_service.hit(key, 5, 900).await.unwrap_err();
    assert!(matches!(err, AppError::RateLimited(_)));

    // A successful login clears the counter
    ctx.rate_limit_service.reset(key).await?;
    ctx.rate_limit_service.hit(key, 5, 900).await?;

    Ok(())
}

#[tokio::test]
async fn test_admin_accounts_cannot_be_self_registered() -> anyhow::Result<()> {
    let ctx = common::setup().await?;

    let err = ctx.user_service.register(CreateUserRequest {
        email: "evil@test.local".to_string(),
        full_name: "Evil Admin".to_string(),
        phone: None,
        password: "long-enough-password".to_string(),
        role: UserRole::Admin,
    }).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() -> anyhow::Result<()> {
    let ctx = common::setup().await?;

    let request = CreateUserRequest {
        email: "driver@test.local".to_string(),
        full_name: "Test Driver".to_string(),
        phone: None,
        password: "long-enough-password".to_string(),
        role: UserRole::CarOwner,
    };

    ctx.user_service.register(request.clone()).await?;
    let err = ctx.user_service.register(request).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn test_hard_purge_cascades_to_bookings() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    let booking = ctx.booking_service.create(&driver, CreateBookingRequest {
        garage_id: garage.id,
        service_id: service.id,
        date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        time_slot: TimeSlot { start: "09:00".to_string(), end: "10:00".to_string() },
        vehicle: VehicleInfo {
            make: "Mazda".to_string(),
            model: "3".to_string(),
            year: None,
            license_plate: None,
        },
        notes: None,
    }).await?;

    // Only admins may purge
    let err = ctx.user_service.hard_delete(&driver, driver.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    ctx.user_service.hard_delete(&admin, driver.id).await?;

    assert!(ctx.user_repo.find_by_id(driver.id).await?.is_none());
    assert!(ctx.booking_repo.find_by_id(booking.id).await?.is_none());
    assert!(ctx.booking_repo.history(booking.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_one_live_garage_per_owner() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let _garage = common::create_active_garage(&ctx, &owner, &admin).await?;

    let err = ctx.garage_service.create(&owner, garagehub::domain::CreateGarageRequest {
        name: "Second Garage".to_string(),
        description: None,
        address: "3 Test Street".to_string(),
        city: None,
        longitude: 0.0,
        latitude: 0.0,
        phone: None,
        email: None,
        business_hours: None,
    }).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn test_service_with_upcoming_bookings_cannot_be_deleted() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;
    let service = common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(&ctx, "driver@test.local").await?;

    // Book far enough out to count as upcoming
    let date = (chrono::Utc::now() + chrono::Duration::days(7)).date_naive();
    let weekday = chrono::Datelike::weekday(&date);
    let date = if weekday == chrono::Weekday::Sun {
        date + chrono::Duration::days(1)
    } else {
        date
    };

    ctx.booking_service.create(&driver, CreateBookingRequest {
        garage_id: garage.id,
        service_id: service.id,
        date,
        time_slot: TimeSlot { start: "09:00".to_string(), end: "10:00".to_string() },
        vehicle: VehicleInfo {
            make: "Kia".to_string(),
            model: "Ceed".to_string(),
            year: None,
            license_plate: None,
        },
        notes: None,
    }).await?;

    let err = ctx.catalog_service.soft_delete(&owner, service.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The same rule protects the garage itself
    let err = ctx.garage_service.soft_delete(&owner, garage.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_service_names_per_garage_conflict() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let admin = common::create_admin(&ctx).await?;
    let owner = common::create_garage_owner(&ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(&ctx, &owner, &admin).await?;

    common::create_service(&ctx, &owner, &garage, "Oil Change", 60).await?;

    // Case-insensitive uniqueness
    let err = common::create_service(&ctx, &owner, &garage, "OIL CHANGE", 30)
        .await
        .unwrap_err();
    let err = err.downcast::<AppError>()?;
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}
