use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod garage_repository;
pub mod service_repository;
pub mod booking_repository;
pub mod review_repository;
pub mod payment_repository;

pub use user_repository::SqliteUserRepository;
pub use garage_repository::SqliteGarageRepository;
pub use service_repository::SqliteServiceRepository;
pub use booking_repository::SqliteBookingRepository;
pub use review_repository::SqliteReviewRepository;
pub use payment_repository::SqlitePaymentRepository;

// Repositories cover reads and single-row writes. Multi-entity writes with
// invariants behind them (booking creation, status transitions, payment
// settlement, review creation) live in the service layer inside explicit
// transactions.

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, request: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
    async fn update(&self, id: Uuid, update: UpdateUserRequest) -> Result<User>;
    async fn soft_delete(&self, id: Uuid, deleted_by: Uuid) -> Result<()>;
}

#[async_trait]
pub trait GarageRepository: Send + Sync {
    async fn create(&self, owner_id: Uuid, request: CreateGarageRequest) -> Result<Garage>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Garage>>;
    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Option<Garage>>;
    async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<Garage>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Garage>>;
    async fn update(&self, id: Uuid, update: UpdateGarageRequest) -> Result<Garage>;
    async fn set_status(&self, id: Uuid, status: GarageStatus, verified: bool) -> Result<Garage>;
    async fn soft_delete(&self, id: Uuid, deleted_by: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, garage_id: Uuid, request: CreateServiceRequest) -> Result<Service>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>>;
    async fn list_by_garage(&self, garage_id: Uuid) -> Result<Vec<Service>>;
    async fn update(&self, id: Uuid, update: UpdateServiceRequest) -> Result<Service>;
    async fn soft_delete(&self, id: Uuid, deleted_by: Uuid) -> Result<()>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_by_car_owner(&self, car_owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>>;
    async fn list_by_garage(&self, garage_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>>;
    async fn list_by_garage_date_range(
        &self,
        garage_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>>;
    async fn history(&self, booking_id: Uuid) -> Result<Vec<StatusHistoryEntry>>;
    async fn statistics(&self, garage_id: Option<Uuid>) -> Result<BookingStatistics>;
    /// Bookings on or after `today` that still hold a slot (pending,
    /// approved or in progress) for the given service.
    async fn upcoming_active_for_service(&self, service_id: Uuid, today: NaiveDate) -> Result<i64>;
    async fn upcoming_active_for_garage(&self, garage_id: Uuid, today: NaiveDate) -> Result<i64>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Review>>;
    async fn list_by_garage(&self, garage_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Review>>;
    async fn list_by_car_owner(&self, car_owner_id: Uuid) -> Result<Vec<Review>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Payment>>;
}
