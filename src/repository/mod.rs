use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod event_repository;
pub mod holder_repository;
pub mod inventory_repository;
pub mod booking_repository;
pub mod payment_repository;

pub use event_repository::SqliteEventRepository;
pub use holder_repository::SqliteHolderRepository;
pub use inventory_repository::SqliteInventoryRepository;
pub use booking_repository::SqliteBookingRepository;
pub use payment_repository::SqlitePaymentRepository;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: Event) -> Result<Event>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>>;
    async fn list_published(&self) -> Result<Vec<Event>>;
}

#[async_trait]
pub trait HolderRepository: Send + Sync {
    async fn create(&self, holder: Holder) -> Result<Holder>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Holder>>;
}

/// Reads of seats and zones, plus bulk creation at event setup. Availability
/// is mutated only by the allocation guard inside booking transactions.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn create_seats(&self, seats: Vec<Seat>) -> Result<Vec<Seat>>;
    async fn create_zone(&self, zone: Zone) -> Result<Zone>;
    async fn find_seat(&self, id: Uuid) -> Result<Option<Seat>>;
    async fn find_zone(&self, id: Uuid) -> Result<Option<Zone>>;
    async fn list_seats(&self, event_id: Uuid) -> Result<Vec<Seat>>;
    async fn list_zones(&self, event_id: Uuid) -> Result<Vec<ZoneAvailability>>;
    async fn zone_available_seats(&self, zone_id: Uuid) -> Result<i64>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>>;
    /// Pending, unconfirmed, uncancelled bookings whose current payment
    /// window opened before `before`.
    async fn list_stale_pending(&self, before: DateTime<Utc>) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_gateway_order_id(&self, order_id: &str) -> Result<Option<Payment>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| crate::error::AppError::Database(e.to_string()))
}

pub(crate) fn parse_optional_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
    s.map(parse_uuid).transpose()
}
