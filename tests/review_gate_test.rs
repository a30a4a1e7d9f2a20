mod common;

use chrono::NaiveDate;
use garagehub::{
    domain::{
        BookingStatus, CreateBookingRequest, CreateReviewRequest, TimeSlot,
        VehicleInfo,
    },
    error::AppError,
};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

fn review_request(
    booking_id: uuid::Uuid,
    garage_id: uuid::Uuid,
    rating: i64,
) -> CreateReviewRequest {
    CreateReviewRequest {
        booking_id,
        garage_id,
        rating,
        title: Some("Solid work".to_string()),
        comment: "Quick turnaround, fair price.".to_string(),
        category_ratings: None,
    }
}

async fn booked_and_completed(
    ctx: &garagehub::service::ServiceContext,
    start: &str,
    end: &str,
) -> anyhow::Result<(garagehub::domain::User, garagehub::domain::User, garagehub::domain::Booking)> {
    let admin = common::create_admin(ctx).await?;
    let owner = common::create_garage_owner(ctx, "owner@test.local").await?;
    let garage = common::create_active_garage(ctx, &owner, &admin).await?;
    let service = common::create_service(ctx, &owner, &garage, "Oil Change", 60).await?;
    let driver = common::create_car_owner(ctx, "driver@test.local").await?;

    let booking = ctx.booking_service.create(&driver, CreateBookingRequest {
        garage_id: garage.id,
        service_id: service.id,
        date: monday(),
        time_slot: TimeSlot { start: start.to_string(), end: end.to_string() },
        vehicle: VehicleInfo {
            make: "Ford".to_string(),
            model: "Focus".to_string(),
            year: None,
            license_plate: None,
        },
        notes: None,
    }).await?;

    ctx.booking_service.transition(&owner, booking.id, BookingStatus::Approved, None).await?;
    ctx.booking_service.transition(&owner, booking.id, BookingStatus::InProgress, None).await?;
    let booking = ctx.booking_service
        .transition(&owner, booking.id, BookingStatus::Completed, None)
        .await?;

    Ok((driver, owner, booking))
}

#[tokio::test]
async fn test_pending_booking_cannot_be_reviewed() -> anyhow::Result<()> {
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
            make: "Ford".to_string(),
            model: "Focus".to_string(),
            year: None,
            license_plate: None,
        },
        notes: None,
    }).await?;

    let err = ctx.review_service
        .create(&driver, review_request(booking.id, garage.id, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_one_review_per_booking() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (driver, _owner, booking) = booked_and_completed(&ctx, "09:00", "10:00").await?;

    let review = ctx.review_service
        .create(&driver, review_request(booking.id, booking.garage_id, 4))
        .await?;
    assert!(review.is_verified);

    // Rating aggregates follow in the same transaction
    let garage = ctx.garage_repo.find_by_id(booking.garage_id).await?.unwrap();
    assert_eq!(garage.stats.total_reviews, 1);
    assert!((garage.stats.average_rating - 4.0).abs() < f64::EPSILON);

    // Second attempt for the same booking conflicts
    let err = ctx.review_service
        .create(&driver, review_request(booking.id, booking.garage_id, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn test_only_the_booking_owner_may_review() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (_driver, _owner, booking) = booked_and_completed(&ctx, "09:00", "10:00").await?;
    let stranger = common::create_car_owner(&ctx, "stranger@test.local").await?;

    let err = ctx.review_service
        .create(&stranger, review_request(booking.id, booking.garage_id, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn test_rating_bounds() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (driver, _owner, booking) = booked_and_completed(&ctx, "09:00", "10:00").await?;

    for bad in [0, 6] {
        let err = ctx.review_service
            .create(&driver, review_request(booking.id, booking.garage_id, bad))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    Ok(())
}

#[tokio::test]
async fn test_garage_responds_exactly_once() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (driver, owner, booking) = booked_and_completed(&ctx, "09:00", "10:00").await?;

    let review = ctx.review_service
        .create(&driver, review_request(booking.id, booking.garage_id, 3))
        .await?;

    // The car owner has no say on the garage side
    let err = ctx.review_service
        .respond(&driver, review.id, "Thanks!".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let review = ctx.review_service
        .respond(&owner, review.id, "Sorry about the wait.".to_string())
        .await?;
    assert!(review.response.is_some());

    let err = ctx.review_service
        .respond(&owner, review.id, "One more thing...".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The response can still be edited and withdrawn
    let review = ctx.review_service
        .update_response(&owner, review.id, "Sorry about the wait!".to_string())
        .await?;
    assert_eq!(review.response.as_ref().unwrap().comment, "Sorry about the wait!");

    let review = ctx.review_service.withdraw_response(&owner, review.id).await?;
    assert!(review.response.is_none());

    Ok(())
}

#[tokio::test]
async fn test_soft_deleting_review_reverses_aggregates() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let (driver, _owner, booking) = booked_and_completed(&ctx, "09:00", "10:00").await?;

    let review = ctx.review_service
        .create(&driver, review_request(booking.id, booking.garage_id, 5))
        .await?;

    ctx.review_service.soft_delete(&driver, review.id).await?;

    let garage = ctx.garage_repo.find_by_id(booking.garage_id).await?.unwrap();
    assert_eq!(garage.stats.total_reviews, 0);
    assert!((garage.stats.average_rating - 0.0).abs() < f64::EPSILON);

    // With the old review gone, the booking can be reviewed again
    let review = ctx.review_service
        .create(&driver, review_request(booking.id, booking.garage_id, 2))
        .await?;
    assert_eq!(review.rating, 2);

    Ok(())
}
