pub mod allocation_guard;
pub mod booking_service;
pub mod payment_service;
pub mod sweeper;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::integrations::IntegrationManager;
use crate::payments::PaymentGateway;
use allocation_guard::AllocationGuard;
use booking_service::BookingService;
use payment_service::PaymentService;

pub use booking_service::{CreateBookingRequest, EventSlots, UserBookings};
pub use payment_service::ReconcileOutcome;

pub struct ServiceContext {
    pub event_repo: Arc<dyn EventRepository>,
    pub holder_repo: Arc<dyn HolderRepository>,
    pub inventory_repo: Arc<dyn InventoryRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub booking_service: Arc<BookingService>,
    pub payment_service: Arc<PaymentService>,
    pub integration_manager: Arc<IntegrationManager>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        integration_manager: Arc<IntegrationManager>,
        currency: String,
    ) -> Self {
        let event_repo: Arc<dyn EventRepository> = Arc::new(SqliteEventRepository::new(db_pool.clone()));
        let holder_repo: Arc<dyn HolderRepository> = Arc::new(SqliteHolderRepository::new(db_pool.clone()));
        let inventory_repo: Arc<dyn InventoryRepository> = Arc::new(SqliteInventoryRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> = Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));

        // One guard per process: every seat and zone claim goes through it.
        let guard = Arc::new(AllocationGuard::new());

        let booking_service = Arc::new(BookingService::new(
            db_pool.clone(),
            event_repo.clone(),
            holder_repo.clone(),
            inventory_repo.clone(),
            booking_repo.clone(),
            guard.clone(),
            integration_manager.clone(),
        ));

        let payment_service = Arc::new(PaymentService::new(
            db_pool.clone(),
            booking_repo.clone(),
            payment_repo.clone(),
            booking_service.clone(),
            guard,
            gateway,
            currency,
        ));

        Self {
            event_repo,
            holder_repo,
            inventory_repo,
            booking_repo,
            payment_repo,
            booking_service,
            payment_service,
            integration_manager,
            db_pool,
        }
    }
}
