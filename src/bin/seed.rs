use garagehub::{
    auth::AuthService,
    domain::{
        CreateBookingRequest, CreateGarageRequest, CreateServiceRequest,
        CreateUserRequest, ServiceCategory, TimeSlot, UpdateUserRequest,
        UserRole, VehicleInfo,
    },
    service::ServiceContext,
};
use chrono::{Duration, Utc};
use clap::Parser;
use fake::{Fake, faker::name::en::Name, faker::phone_number::en::PhoneNumber};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Seed the GarageHub database with demo data")]
struct Args {
    /// Database to seed
    #[arg(long, default_value = "sqlite:garagehub.db")]
    database_url: String,

    /// Number of car-owner accounts to create
    #[arg(long, default_value_t = 5)]
    car_owners: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let auth_service = Arc::new(AuthService::new(db_pool.clone()));
    let ctx = ServiceContext::new(auth_service, db_pool.clone());

    // Admin account
    println!("👥 Creating users...");
    let admin = ctx.user_repo.create(CreateUserRequest {
        email: "admin@garagehub.local".to_string(),
        full_name: "Admin User".to_string(),
        phone: None,
        password: "admin123".to_string(),
        role: UserRole::Admin,
    }).await?;
    println!("  ✅ Created admin user (admin@garagehub.local / admin123)");

    // Garage owner with a verified garage
    let owner = ctx.user_repo.create(CreateUserRequest {
        email: "owner@garagehub.local".to_string(),
        full_name: Name().fake(),
        phone: Some(PhoneNumber().fake()),
        password: "password123".to_string(),
        role: UserRole::GarageOwner,
    }).await?;

    let owner = ctx.user_repo.update(owner.id, UpdateUserRequest {
        can_create_garage: Some(true),
        ..Default::default()
    }).await?;

    let garage = ctx.garage_service.create(&owner, CreateGarageRequest {
        name: "Downtown Auto Works".to_string(),
        description: Some("Full-service repair shop".to_string()),
        address: "421 Main Street".to_string(),
        city: Some("Springfield".to_string()),
        longitude: -89.65,
        latitude: 39.80,
        phone: Some(PhoneNumber().fake()),
        email: Some("shop@downtownautoworks.example".to_string()),
        business_hours: None,
    }).await?;

    // Admin verification is what actually activates the garage
    let garage = ctx.garage_service.verify(&admin, garage.id, true).await?;
    println!("  ✅ Created garage '{}' (active)", garage.name);

    println!("🔧 Creating services...");
    let oil_change = ctx.catalog_service.create(&owner, garage.id, CreateServiceRequest {
        name: "Oil Change".to_string(),
        description: Some("Engine oil and filter replacement".to_string()),
        category: ServiceCategory::Maintenance,
        price_cents: 4999,
        duration_minutes: 60,
    }).await?;

    ctx.catalog_service.create(&owner, garage.id, CreateServiceRequest {
        name: "Brake Inspection".to_string(),
        description: Some("Full brake system check".to_string()),
        category: ServiceCategory::Inspection,
        price_cents: 2999,
        duration_minutes: 30,
    }).await?;

    ctx.catalog_service.create(&owner, garage.id, CreateServiceRequest {
        name: "Engine Diagnostic".to_string(),
        description: Some("OBD scan and diagnosis".to_string()),
        category: ServiceCategory::Diagnostic,
        price_cents: 7999,
        duration_minutes: 90,
    }).await?;
    println!("  ✅ Created 3 services");

    println!("🚗 Creating car owners and bookings...");
    let makes = ["Toyota", "Honda", "Ford", "Volkswagen", "Subaru"];
    let models = ["Corolla", "Civic", "Focus", "Golf", "Outback"];

    for i in 0..args.car_owners {
        let car_owner = ctx.user_repo.create(CreateUserRequest {
            email: format!("driver{}@example.com", i + 1),
            full_name: Name().fake(),
            phone: Some(PhoneNumber().fake()),
            password: "password123".to_string(),
            role: UserRole::CarOwner,
        }).await?;

        // One future booking each, staggered across days so slots don't
        // collide.
        let date = (Utc::now() + Duration::days(i as i64 + 1)).date_naive();
        let booking = ctx.booking_service.create(&car_owner, CreateBookingRequest {
            garage_id: garage.id,
            service_id: oil_change.id,
            date,
            time_slot: TimeSlot {
                start: "09:00".to_string(),
                end: "10:00".to_string(),
            },
            vehicle: VehicleInfo {
                make: makes[i % makes.len()].to_string(),
                model: models[i % models.len()].to_string(),
                year: Some(2015 + (i as i64 % 10)),
                license_plate: Some(format!("GH-{:04}", 1000 + i)),
            },
            notes: None,
        }).await;

        match booking {
            Ok(b) => println!("  ✅ {} booked {} on {}", car_owner.email, oil_change.name, b.date),
            Err(e) => println!("  ⚠️ Booking for {} skipped: {}", car_owner.email, e),
        }
    }

    println!("🎉 Seeding complete.");

    Ok(())
}
