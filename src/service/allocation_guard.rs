use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::SqliteConnection;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    domain::{Booking, Slot, SlotKey},
    error::{AppError, Result},
    repository::inventory_repository,
};

/// Exclusive right to mutate one seat or zone within this process.
///
/// Leases are taken before a transaction is opened and held until it commits
/// or rolls back, so claims on one slot run one at a time while claims on
/// different slots proceed in parallel. The database write lock taken by the
/// first statement of each transaction covers other processes.
pub struct SlotLease {
    key: SlotKey,
    _guard: OwnedMutexGuard<()>,
}

impl SlotLease {
    pub fn key(&self) -> SlotKey {
        self.key
    }
}

/// The only path that flips seat availability or admits zone units.
#[derive(Default)]
pub struct AllocationGuard {
    leases: Mutex<HashMap<SlotKey, Arc<AsyncMutex<()>>>>,
}

impl AllocationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lease(&self, key: SlotKey) -> SlotLease {
        let lock = {
            let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only the map references have no holder and no waiter.
            leases.retain(|_, lock| Arc::strong_count(lock) > 1);
            leases
                .entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        SlotLease {
            key,
            _guard: lock.lock_owned().await,
        }
    }

    /// Claims a freshly resolved slot for a new booking.
    pub async fn claim(&self, lease: &SlotLease, conn: &mut SqliteConnection, slot: &Slot) -> Result<()> {
        Self::check_lease(lease, slot.key())?;

        match slot {
            Slot::Seat(seat) => inventory_repository::reserve_seat(conn, seat.id).await,
            Slot::ZoneUnits { zone, quantity } => {
                inventory_repository::lock_zone(&mut *conn, zone.id).await?;
                inventory_repository::reserve_zone_units(conn, zone.id, *quantity).await
            }
        }
    }

    /// Re-claims the slot of a booking whose hold was released by a failed
    /// payment. The booking must not be counted as holding yet.
    pub async fn claim_existing(
        &self,
        lease: &SlotLease,
        conn: &mut SqliteConnection,
        booking: &Booking,
    ) -> Result<()> {
        let key = booking.slot_key()?;
        Self::check_lease(lease, key)?;

        match key {
            SlotKey::Seat(seat_id) => inventory_repository::reserve_seat(conn, seat_id).await,
            SlotKey::Zone(zone_id) => {
                inventory_repository::lock_zone(&mut *conn, zone_id).await?;
                inventory_repository::reserve_zone_units(conn, zone_id, booking.quantity).await
            }
        }
    }

    pub async fn release(&self, lease: &SlotLease, conn: &mut SqliteConnection) -> Result<()> {
        match lease.key() {
            SlotKey::Seat(seat_id) => inventory_repository::release_seat(conn, seat_id).await,
            SlotKey::Zone(zone_id) => {
                inventory_repository::release_zone_units(zone_id);
                Ok(())
            }
        }
    }

    fn check_lease(lease: &SlotLease, key: SlotKey) -> Result<()> {
        if lease.key == key {
            Ok(())
        } else {
            Err(AppError::Internal(format!(
                "Lease on {:?} does not cover {:?}",
                lease.key, key
            )))
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.leases.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
