use garagehub::{
    auth::AuthService,
    domain::{
        CreateGarageRequest, CreateServiceRequest, CreateUserRequest, Garage,
        Service, ServiceCategory, UpdateUserRequest, User, UserRole,
    },
    service::ServiceContext,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

/// One connection keeps every query on the same in-memory database; a
/// pooled `:memory:` URL would otherwise hand each connection its own
/// empty database.
pub async fn setup() -> anyhow::Result<ServiceContext> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    let auth_service = Arc::new(AuthService::new(pool.clone()));
    Ok(ServiceContext::new(auth_service, pool))
}

pub async fn create_admin(ctx: &ServiceContext) -> anyhow::Result<User> {
    Ok(ctx.user_repo.create(CreateUserRequest {
        email: "admin@test.local".to_string(),
        full_name: "Test Admin".to_string(),
        phone: None,
        password: "admin-password".to_string(),
        role: UserRole::Admin,
    }).await?)
}

pub async fn create_car_owner(ctx: &ServiceContext, email: &str) -> anyhow::Result<User> {
    Ok(ctx.user_repo.create(CreateUserRequest {
        email: email.to_string(),
        full_name: "Test Driver".to_string(),
        phone: None,
        password: "driver-password".to_string(),
        role: UserRole::CarOwner,
    }).await?)
}

pub async fn create_garage_owner(ctx: &ServiceContext, email: &str) -> anyhow::Result<User> {
    let owner = ctx.user_repo.create(CreateUserRequest {
        email: email.to_string(),
        full_name: "Test Mechanic".to_string(),
        phone: None,
        password: "owner-password".to_string(),
        role: UserRole::GarageOwner,
    }).await?;

    // Pretend the registration fee was paid
    Ok(ctx.user_repo.update(owner.id, UpdateUserRequest {
        can_create_garage: Some(true),
        ..Default::default()
    }).await?)
}

/// An admin-verified, active garage with default hours (09:00-18:00, closed
/// Sunday).
pub async fn create_active_garage(
    ctx: &ServiceContext,
    owner: &User,
    admin: &User,
) -> anyhow::Result<Garage> {
    let garage = ctx.garage_service.create(owner, CreateGarageRequest {
        name: "Test Garage".to_string(),
        description: None,
        address: "1 Test Street".to_string(),
        city: None,
        longitude: 10.0,
        latitude: 50.0,
        phone: None,
        email: None,
        business_hours: None,
    }).await?;

    Ok(ctx.garage_service.verify(admin, garage.id, true).await?)
}

pub async fn create_service(
    ctx: &ServiceContext,
    owner: &User,
    garage: &Garage,
    name: &str,
    duration_minutes: i64,
) -> anyhow::Result<Service> {
    Ok(ctx.catalog_service.create(owner, garage.id, CreateServiceRequest {
        name: name.to_string(),
        description: None,
        category: ServiceCategory::Maintenance,
        price_cents: 4999,
        duration_minutes,
    }).await?)
}
