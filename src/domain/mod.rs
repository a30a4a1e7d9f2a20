pub mod user;
pub mod garage;
pub mod service;
pub mod booking;
pub mod review;
pub mod payment;

pub use user::*;
pub use garage::*;
pub use service::*;
pub use booking::*;
pub use review::*;
pub use payment::*;

use uuid::Uuid;

/// Ownership capability. Every entity that belongs to a user exposes its
/// owning user id through this trait so a single authorization routine can
/// compare it against the requesting principal, instead of branching on
/// entity type.
pub trait Owned {
    fn owner_id(&self) -> Option<Uuid>;
}
