pub mod availability;
pub mod booking_service;
pub mod catalog_service;
pub mod garage_service;
pub mod payment_service;
pub mod rate_limit;
pub mod review_service;
pub mod user_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;

pub use availability::AvailabilityService;
pub use booking_service::BookingService;
pub use catalog_service::CatalogService;
pub use garage_service::GarageService;
pub use payment_service::PaymentService;
pub use rate_limit::RateLimitService;
pub use review_service::ReviewService;
pub use user_service::UserService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub garage_repo: Arc<dyn GarageRepository>,
    pub service_repo: Arc<dyn ServiceRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub auth_service: Arc<AuthService>,
    pub availability_service: Arc<AvailabilityService>,
    pub booking_service: Arc<BookingService>,
    pub catalog_service: Arc<CatalogService>,
    pub garage_service: Arc<GarageService>,
    pub payment_service: Arc<PaymentService>,
    pub rate_limit_service: Arc<RateLimitService>,
    pub review_service: Arc<ReviewService>,
    pub user_service: Arc<UserService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(auth_service: Arc<AuthService>, db_pool: SqlitePool) -> Self {
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let garage_repo: Arc<dyn GarageRepository> =
            Arc::new(SqliteGarageRepository::new(db_pool.clone()));
        let service_repo: Arc<dyn ServiceRepository> =
            Arc::new(SqliteServiceRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let review_repo: Arc<dyn ReviewRepository> =
            Arc::new(SqliteReviewRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));

        let availability_service = Arc::new(AvailabilityService::new(db_pool.clone()));
        let booking_service = Arc::new(BookingService::new(db_pool.clone()));
        let garage_service = Arc::new(GarageService::new(
            garage_repo.clone(),
            booking_repo.clone(),
            db_pool.clone(),
        ));
        let catalog_service = Arc::new(CatalogService::new(
            service_repo.clone(),
            garage_repo.clone(),
            booking_repo.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(db_pool.clone()));
        let rate_limit_service = Arc::new(RateLimitService::new(db_pool.clone()));
        let review_service = Arc::new(ReviewService::new(db_pool.clone()));
        let user_service = Arc::new(UserService::new(user_repo.clone(), db_pool.clone()));

        Self {
            user_repo,
            garage_repo,
            service_repo,
            booking_repo,
            review_repo,
            payment_repo,
            auth_service,
            availability_service,
            booking_service,
            catalog_service,
            garage_service,
            payment_service,
            rate_limit_service,
            review_service,
            user_service,
            db_pool,
        }
    }
}
